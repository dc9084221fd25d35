//! SEI payload classification and best-effort text/JSON decoding

use std::borrow::Cow;
use std::fmt;

use serde_json::Value;
use uuid::Uuid;

use crate::codec::{Codec, SeiMessage};
use crate::error::ProbeError;

/// Declares [`SeiPayloadType`] together with its code and name tables.
macro_rules! sei_payload_types {
    ($($(#[$doc:meta])* $variant:ident = $code:literal => $name:literal,)+) => {
        /// SEI `payloadType` values (H.264 Annex D, H.265 Annex D, plus
        /// application-defined live-streaming metadata)
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum SeiPayloadType {
            $($(#[$doc])* $variant,)+
            /// Any value without a table entry
            Unknown(u32),
        }

        impl From<u32> for SeiPayloadType {
            fn from(value: u32) -> Self {
                match value {
                    $($code => SeiPayloadType::$variant,)+
                    v => SeiPayloadType::Unknown(v),
                }
            }
        }

        impl SeiPayloadType {
            /// Every known payload type, in code order.
            pub const KNOWN: &'static [SeiPayloadType] = &[$(SeiPayloadType::$variant,)+];

            pub fn code(self) -> u32 {
                match self {
                    $(SeiPayloadType::$variant => $code,)+
                    SeiPayloadType::Unknown(v) => v,
                }
            }

            /// Human-readable name; `unknown_<type>` for unmapped values.
            pub fn name(self) -> Cow<'static, str> {
                match self {
                    $(SeiPayloadType::$variant => Cow::Borrowed($name),)+
                    SeiPayloadType::Unknown(v) => Cow::Owned(format!("unknown_{}", v)),
                }
            }
        }
    };
}

sei_payload_types! {
    BufferingPeriod = 0 => "buffering_period",
    PicTiming = 1 => "pic_timing",
    PanScanRect = 2 => "pan_scan_rect",
    FillerPayload = 3 => "filler_payload",
    /// ITU-T T.35 registered user data (HDR10+, captions)
    UserDataRegisteredItuTT35 = 4 => "user_data_registered_itu_t_t35",
    /// UUID-prefixed user data
    UserDataUnregistered = 5 => "user_data_unregistered",
    RecoveryPoint = 6 => "recovery_point",
    DecRefPicMarkingRepetition = 7 => "dec_ref_pic_marking_repetition",
    SparePic = 8 => "spare_pic",
    SceneInfo = 9 => "scene_info",
    SubSeqInfo = 10 => "sub_seq_info",
    SubSeqLayerCharacteristics = 11 => "sub_seq_layer_characteristics",
    SubSeqCharacteristics = 12 => "sub_seq_characteristics",
    FullFrameFreeze = 13 => "full_frame_freeze",
    FullFrameFreezeRelease = 14 => "full_frame_freeze_release",
    FullFrameSnapshot = 15 => "full_frame_snapshot",
    ProgressiveRefinementSegmentStart = 16 => "progressive_refinement_segment_start",
    ProgressiveRefinementSegmentEnd = 17 => "progressive_refinement_segment_end",
    MotionConstrainedSliceGroupSet = 18 => "motion_constrained_slice_group_set",
    FilmGrainCharacteristics = 19 => "film_grain_characteristics",
    DeblockingFilterDisplayPreference = 20 => "deblocking_filter_display_preference",
    StereoVideoInfo = 21 => "stereo_video_info",
    PostFilterHint = 22 => "post_filter_hint",
    ToneMappingInfo = 23 => "tone_mapping_info",
    ScalabilityInfo = 24 => "scalability_info",
    SubPicScalableLayer = 25 => "sub_pic_scalable_layer",
    NonRequiredLayerRep = 26 => "non_required_layer_rep",
    PriorityLayerInfo = 27 => "priority_layer_info",
    LayersNotPresentAvc = 28 => "layers_not_present",
    LayerDependencyChange = 29 => "layer_dependency_change",
    ScalableNestingAvc = 30 => "scalable_nesting",
    BaseLayerTemporalHrd = 31 => "base_layer_temporal_hrd",
    QualityLayerIntegrityCheck = 32 => "quality_layer_integrity_check",
    RedundantPicProperty = 33 => "redundant_pic_property",
    Tl0DepRepIndex = 34 => "tl0_dep_rep_index",
    TlSwitchingPoint = 35 => "tl_switching_point",
    ParallelDecodingInfo = 36 => "parallel_decoding_info",
    MvcScalableNesting = 37 => "mvc_scalable_nesting",
    ViewScalabilityInfo = 38 => "view_scalability_info",
    MultiviewSceneInfoAvc = 39 => "multiview_scene_info",
    MultiviewAcquisitionInfoAvc = 40 => "multiview_acquisition_info",
    NonRequiredViewComponent = 41 => "non_required_view_component",
    ViewDependencyChange = 42 => "view_dependency_change",
    OperationPointsNotPresent = 43 => "operation_points_not_present",
    BaseViewTemporalHrd = 44 => "base_view_temporal_hrd",
    FramePackingArrangement = 45 => "frame_packing_arrangement",
    MultiviewViewPositionAvc = 46 => "multiview_view_position",
    DisplayOrientation = 47 => "display_orientation",
    MvcdScalableNesting = 48 => "mvcd_scalable_nesting",
    MvcdViewScalabilityInfo = 49 => "mvcd_view_scalability_info",
    DepthRepresentationInfoAvc = 50 => "depth_representation_info",
    ThreeDimensionalReferenceDisplaysInfoAvc = 51 => "three_dimensional_reference_displays_info",
    DepthTiming = 52 => "depth_timing",
    DepthSamplingInfo = 53 => "depth_sampling_info",
    ConstrainedDepthParameterSetIdentifier = 54 => "constrained_depth_parameter_set_identifier",
    GreenMetadata = 56 => "green_metadata",
    /// Live-streaming metadata (timestamps, bitrate) written by ingest encoders
    LiveMetadata = 100 => "live_metadata",
    /// Per-frame audio loudness measurements
    AudioLoudnessDetail = 101 => "audio_loudness_detail",
    StructureOfPicturesInfo = 128 => "structure_of_pictures_info",
    ActiveParameterSets = 129 => "active_parameter_sets",
    DecodingUnitInfo = 130 => "decoding_unit_info",
    TemporalSubLayerZeroIndex = 131 => "temporal_sub_layer_zero_index",
    DecodedPictureHash = 132 => "decoded_picture_hash",
    ScalableNesting = 133 => "scalable_nesting",
    RegionRefreshInfo = 134 => "region_refresh_info",
    NoDisplay = 135 => "no_display",
    TimeCode = 136 => "time_code",
    MasteringDisplayColourVolume = 137 => "mastering_display_colour_volume",
    SegmentedRectFramePackingArrangement = 138 => "segmented_rect_frame_packing_arrangement",
    TemporalMotionConstrainedTileSets = 139 => "temporal_motion_constrained_tile_sets",
    ChromaResamplingFilterHint = 140 => "chroma_resampling_filter_hint",
    KneeFunctionInfo = 141 => "knee_function_info",
    ColourRemappingInfo = 142 => "colour_remapping_info",
    DeinterlacedFieldIdentification = 143 => "deinterlaced_field_identification",
    ContentLightLevelInfo = 144 => "content_light_level_info",
    DependentRapIndication = 145 => "dependent_rap_indication",
    CodedRegionCompletion = 146 => "coded_region_completion",
    AlternativeTransferCharacteristics = 147 => "alternative_transfer_characteristics",
    AmbientViewingEnvironment = 148 => "ambient_viewing_environment",
    ContentColourVolume = 149 => "content_colour_volume",
    EquirectangularProjection = 150 => "equirectangular_projection",
    CubemapProjection = 151 => "cubemap_projection",
    FisheyeVideoInfo = 152 => "fisheye_video_info",
    SphereRotation = 154 => "sphere_rotation",
    RegionwisePacking = 155 => "regionwise_packing",
    OmniViewport = 156 => "omni_viewport",
    RegionalNesting = 157 => "regional_nesting",
    MctsExtractionInfoSets = 158 => "mcts_extraction_info_sets",
    MctsExtractionInfoNesting = 159 => "mcts_extraction_info_nesting",
    LayersNotPresent = 160 => "layers_not_present",
    InterLayerConstrainedTileSets = 161 => "inter_layer_constrained_tile_sets",
    BspNesting = 162 => "bsp_nesting",
    BspInitialArrivalTime = 163 => "bsp_initial_arrival_time",
    SubBitstreamProperty = 164 => "sub_bitstream_property",
    AlphaChannelInfo = 165 => "alpha_channel_info",
    OverlayInfo = 166 => "overlay_info",
    TemporalMvPredictionConstraints = 167 => "temporal_mv_prediction_constraints",
    FrameFieldInfo = 168 => "frame_field_info",
    ThreeDimensionalReferenceDisplaysInfo = 176 => "three_dimensional_reference_displays_info",
    DepthRepresentationInfo = 177 => "depth_representation_info",
    MultiviewSceneInfo = 178 => "multiview_scene_info",
    MultiviewAcquisitionInfo = 179 => "multiview_acquisition_info",
    MultiviewViewPosition = 180 => "multiview_view_position",
    AlternativeDepthInfo = 181 => "alternative_depth_info",
    SeiManifest = 200 => "sei_manifest",
    SeiPrefixIndication = 201 => "sei_prefix_indication",
    AnnotatedRegions = 202 => "annotated_regions",
    ShutterIntervalInfo = 205 => "shutter_interval_info",
}

impl fmt::Display for SeiPayloadType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())
    }
}

/// Length of the UUID that prefixes `user_data_unregistered` payloads.
const UUID_LEN: usize = 16;

/// Options for turning a message into a record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodeOptions {
    /// Drop trailing `0x00` bytes before text decoding.
    pub strip_trailing_nul: bool,
}

impl Default for DecodeOptions {
    fn default() -> Self {
        Self {
            strip_trailing_nul: true,
        }
    }
}

/// Where a message was found; copied into the record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeiContext {
    pub codec: Codec,
    pub nal_unit_type: u8,
    /// Absolute offset of the SEI NAL unit
    pub offset: usize,
    pub timestamp_ms: Option<u32>,
}

/// A fully classified SEI payload.
#[derive(Debug, Clone, PartialEq)]
pub struct SeiRecord {
    pub codec: Codec,
    pub nal_unit_type: u8,
    /// Absolute offset of the SEI NAL unit
    pub offset: usize,
    /// Container timestamp of the enclosing frame, when known
    pub timestamp_ms: Option<u32>,
    pub sei_type: u32,
    pub type_name: String,
    pub size: usize,
    pub raw_bytes: Vec<u8>,
    /// Hex UUID of a `user_data_unregistered` payload
    pub uuid: Option<String>,
    pub decoded_string: Option<String>,
    pub decoded_json: Option<Value>,
}

/// Turn a parsed message into a record, decoding text and JSON when possible.
pub fn classify(message: SeiMessage, context: SeiContext, options: &DecodeOptions) -> SeiRecord {
    let payload_type = SeiPayloadType::from(message.payload_type);

    let uuid = match payload_type {
        SeiPayloadType::UserDataUnregistered => message
            .raw_bytes
            .get(..UUID_LEN)
            .and_then(|bytes| Uuid::from_slice(bytes).ok())
            .map(|uuid| uuid.to_string()),
        _ => None,
    };

    let decoded_string = decode_text(&message.raw_bytes, message.offset, options)
        .or_else(|e| match uuid {
            Some(_) => decode_text(&message.raw_bytes[UUID_LEN..], message.offset, options),
            None => Err(e),
        })
        .map_err(|e| tracing::trace!("{}", e))
        .ok();

    let decoded_json = decoded_string
        .as_deref()
        .map(|text| decode_json(text, message.offset))
        .transpose()
        .map_err(|e| tracing::trace!("{}", e))
        .ok()
        .flatten();

    SeiRecord {
        codec: context.codec,
        nal_unit_type: context.nal_unit_type,
        offset: context.offset,
        timestamp_ms: context.timestamp_ms,
        sei_type: message.payload_type,
        type_name: payload_type.name().into_owned(),
        size: message.payload_size,
        raw_bytes: message.raw_bytes,
        uuid,
        decoded_string,
        decoded_json,
    }
}

/// Strict UTF-8 decode; no replacement characters.
fn decode_text(bytes: &[u8], offset: usize, options: &DecodeOptions) -> Result<String, ProbeError> {
    let bytes = if options.strip_trailing_nul {
        let end = bytes.iter().rposition(|&b| b != 0).map_or(0, |i| i + 1);
        &bytes[..end]
    } else {
        bytes
    };

    std::str::from_utf8(bytes)
        .map(str::to_owned)
        .map_err(|_| ProbeError::TextDecode { offset })
}

fn decode_json(text: &str, offset: usize) -> Result<Value, ProbeError> {
    serde_json::from_str(text.trim()).map_err(|e| ProbeError::JsonParse {
        offset,
        reason: e.to_string(),
    })
}
