//! Bitstream and container builders shared by the integration tests

#![allow(dead_code)]

use seiscope_probe::cursor::rbsp_to_ebsp;
use seiscope_probe::Codec;

/// Encode a value with the SEI `0xFF`-run scheme.
pub fn ff_coded(mut value: u32) -> Vec<u8> {
    let mut out = Vec::new();
    while value >= 255 {
        out.push(0xFF);
        value -= 255;
    }
    out.push(value as u8);
    out
}

/// Build an SEI NAL unit carrying `messages`, escaped and stop-bit terminated.
pub fn sei_nalu(codec: Codec, messages: &[(u32, &[u8])]) -> Vec<u8> {
    let mut rbsp = Vec::new();
    for (payload_type, payload) in messages {
        rbsp.extend(ff_coded(*payload_type));
        rbsp.extend(ff_coded(payload.len() as u32));
        rbsp.extend_from_slice(payload);
    }
    rbsp.push(0x80);

    let mut nalu = match codec {
        Codec::H264 => vec![0x06],
        Codec::H265 => vec![0x4E, 0x01],
    };
    nalu.extend(rbsp_to_ebsp(&rbsp));
    nalu
}

/// A parameter set NAL unit that makes the codec easy to sniff.
pub fn sps(codec: Codec) -> Vec<u8> {
    match codec {
        Codec::H264 => vec![0x67, 0x64, 0x00, 0x1F, 0xAC, 0xD9],
        Codec::H265 => vec![0x42, 0x01, 0x01, 0x01, 0x60, 0x00],
    }
}

/// Join NAL units with 4-byte start codes.
pub fn annexb(nalus: &[Vec<u8>]) -> Vec<u8> {
    let mut out = Vec::new();
    for nalu in nalus {
        out.extend_from_slice(&[0x00, 0x00, 0x00, 0x01]);
        out.extend_from_slice(nalu);
    }
    out
}

/// Prefix each NAL unit with a big-endian length of `length_size` bytes.
pub fn length_prefixed(nalus: &[Vec<u8>], length_size: usize) -> Vec<u8> {
    let mut out = Vec::new();
    for nalu in nalus {
        let len = (nalu.len() as u32).to_be_bytes();
        out.extend_from_slice(&len[4 - length_size..]);
        out.extend_from_slice(nalu);
    }
    out
}

/// FLV file header plus `PreviousTagSize0`.
pub fn flv_header() -> Vec<u8> {
    vec![b'F', b'L', b'V', 0x01, 0x01, 0x00, 0x00, 0x00, 0x09, 0x00, 0x00, 0x00, 0x00]
}

/// One FLV tag followed by its `PreviousTagSize`.
pub fn flv_tag(tag_type: u8, timestamp: u32, body: &[u8]) -> Vec<u8> {
    let size = body.len() as u32;
    let mut out = vec![tag_type];
    out.extend_from_slice(&size.to_be_bytes()[1..]);
    out.extend_from_slice(&timestamp.to_be_bytes()[1..]);
    out.push((timestamp >> 24) as u8);
    out.extend_from_slice(&[0x00, 0x00, 0x00]);
    out.extend_from_slice(body);
    out.extend_from_slice(&(size + 11).to_be_bytes());
    out
}

/// Legacy AVC/HEVC video tag body with 4-byte NAL lengths.
pub fn legacy_video_body(codec: Codec, nalus: &[Vec<u8>]) -> Vec<u8> {
    let codec_id = match codec {
        Codec::H264 => 0x07,
        Codec::H265 => 0x0C,
    };
    let mut body = vec![0x10 | codec_id, 0x01, 0x00, 0x00, 0x00];
    body.extend(length_prefixed(nalus, 4));
    body
}

/// Legacy AVC sequence header declaring `length_size`-byte NAL lengths.
pub fn avc_sequence_header(length_size: u8) -> Vec<u8> {
    vec![
        0x17, 0x00, 0x00, 0x00, 0x00, 0x01, 0x64, 0x00, 0x1F, 0xFC | (length_size - 1), 0xE0,
    ]
}

/// Enhanced RTMP `CodedFramesX` body for HEVC.
pub fn enhanced_hevc_body(nalus: &[Vec<u8>]) -> Vec<u8> {
    let mut body = vec![0x93, b'h', b'v', b'c', b'1'];
    body.extend(length_prefixed(nalus, 4));
    body
}

/// A single ISO-BMFF box.
pub fn mp4_box(box_type: &[u8; 4], body: &[u8]) -> Vec<u8> {
    let mut out = ((body.len() + 8) as u32).to_be_bytes().to_vec();
    out.extend_from_slice(box_type);
    out.extend_from_slice(body);
    out
}

fn full_box(box_type: &[u8; 4], body: &[u8]) -> Vec<u8> {
    let mut content = vec![0, 0, 0, 0];
    content.extend_from_slice(body);
    mp4_box(box_type, &content)
}

fn be_u32s(values: &[u32]) -> Vec<u8> {
    values.iter().flat_map(|v| v.to_be_bytes()).collect()
}

/// `ftyp` + `mdat` + `moov` with one AVC video track. Each sample is one
/// chunk holding 4-byte length-prefixed NAL units, and a short audio frame
/// sits before every sample in `mdat`.
pub fn mp4(samples: &[Vec<u8>]) -> Vec<u8> {
    const AUDIO: &[u8] = &[0xFF, 0xF1, 0x50, 0x80, 0x02, 0x1F, 0xFC];

    let mut out = mp4_box(b"ftyp", b"isom\x00\x00\x02\x00isomavc1");
    let mut mdat = Vec::new();
    let mut offsets = Vec::new();
    let body_start = out.len() as u32 + 8;
    for sample in samples {
        mdat.extend_from_slice(AUDIO);
        offsets.push(body_start + mdat.len() as u32);
        mdat.extend_from_slice(sample);
    }
    out.extend(mp4_box(b"mdat", &mdat));

    let count = samples.len() as u32;
    let mut entry = vec![0u8; 78];
    entry.extend(mp4_box(b"avcC", &[0x01, 0x64, 0x00, 0x1F, 0xFF, 0xE0, 0x00]));
    let mut stsd = be_u32s(&[1]);
    stsd.extend(mp4_box(b"avc1", &entry));
    let mut stsz = be_u32s(&[0, count]);
    stsz.extend(samples.iter().flat_map(|s| (s.len() as u32).to_be_bytes()));
    let mut stco = be_u32s(&[count]);
    stco.extend(be_u32s(&offsets));

    let mut stbl = full_box(b"stsd", &stsd);
    stbl.extend(full_box(b"stts", &be_u32s(&[1, count, 40])));
    stbl.extend(full_box(b"stsc", &be_u32s(&[1, 1, 1, 1])));
    stbl.extend(full_box(b"stsz", &stsz));
    stbl.extend(full_box(b"stco", &stco));

    let mut hdlr = be_u32s(&[0]);
    hdlr.extend_from_slice(b"vide");
    hdlr.extend_from_slice(&[0u8; 13]);
    let mut mdia = full_box(b"mdhd", &be_u32s(&[0, 0, 1000, 0, 0]));
    mdia.extend(full_box(b"hdlr", &hdlr));
    mdia.extend(mp4_box(b"minf", &mp4_box(b"stbl", &stbl)));
    out.extend(mp4_box(b"moov", &mp4_box(b"trak", &mp4_box(b"mdia", &mdia))));
    out
}
