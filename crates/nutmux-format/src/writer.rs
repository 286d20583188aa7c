//! NUT 序列化器.
//!
//! 负责把已排好序的帧写成 NUT 字节流:
//! 文件标识 -> 主头 -> 流头 -> (同步点 + 帧记录)* -> 索引.
//!
//! 每一帧都是关键帧, 帧记录统一使用通用帧码 1, 所有字段在帧头中显式编码:
//! ```text
//! frame_code     u8  (= 1)
//! coded_flags    v   (KEY | STREAM_ID | CODED_PTS | SIZE_MSB | CHECKSUM)
//! stream_id      v
//! coded_pts      v   (pts + 2^msb_pts_shift, 即完整 pts)
//! data_size_msb  v
//! header_crc     u32 (从 frame_code 开始)
//! data           ...
//! ```
//!
//! 同步点在第一帧之前写入, 之后每当下一帧会让同步点间距超过 `max_distance` 时写入.

use log::{debug, trace};
use nutmux_core::crc::crc32;
use nutmux_core::{MuxError, MuxResult, Rational};

use crate::header::{MuxHeaders, StreamHeader};
use crate::io::IoContext;
use crate::nut::{
    FILE_ID, FrameCode, FrameCodeTable, FrameFlags, INDEX_STARTCODE, MAIN_STARTCODE, NutBuf,
    STREAM_STARTCODE, SYNCPOINT_STARTCODE, coded_timestamp, packet_size, write_packet,
};

/// 为同步点判断预留的帧头开销 (字节)
const FRAME_HEADER_SLACK: u64 = 30;

/// 索引中一个类型 0 标志块最多携带的同步点数
const INDEX_FLAG_CHUNK: usize = 32;

/// 帧头中显式编码的标志
const CODED_FRAME_FLAGS: FrameFlags = FrameFlags::KEY
    .union(FrameFlags::STREAM_ID)
    .union(FrameFlags::CODED_PTS)
    .union(FrameFlags::SIZE_MSB)
    .union(FrameFlags::CHECKSUM);

/// NUT 写入器
#[derive(Debug)]
pub struct NutWriter {
    headers: MuxHeaders,
    /// 已写出的同步点位置
    syncpoints: Vec<u64>,
    /// keyframe_pts[stream][k]: 同步点 k 之后该流的第一个关键帧 pts
    keyframe_pts: Vec<Vec<Option<u64>>>,
    /// 全局最大 pts 及其所属流
    max_pts: Option<(u64, u32)>,
    frames_per_stream: Vec<u64>,
}

impl NutWriter {
    /// 创建写入器
    pub fn new(headers: MuxHeaders) -> Self {
        let stream_count = headers.streams.len();
        Self {
            headers,
            syncpoints: Vec::new(),
            keyframe_pts: vec![Vec::new(); stream_count],
            max_pts: None,
            frames_per_stream: vec![0; stream_count],
        }
    }

    /// 头部信息
    pub fn headers(&self) -> &MuxHeaders {
        &self.headers
    }

    /// 写入文件标识、主头和全部流头
    pub fn write_header(&mut self, io: &mut IoContext) -> MuxResult<()> {
        io.write_all(FILE_ID)?;
        write_packet(io, MAIN_STARTCODE, &self.headers.main.encode())?;
        for stream in &self.headers.streams {
            write_packet(io, STREAM_STARTCODE, &stream.encode())?;
        }
        debug!(
            "NUT: 头部已写入, {} 条流, {} 字节",
            self.headers.streams.len(),
            io.position()
        );
        Ok(())
    }

    /// 写入一帧 (必要时先写同步点), 返回该帧占用的字节数
    pub fn write_frame(
        &mut self,
        io: &mut IoContext,
        stream_id: u32,
        pts: u64,
        data: &[u8],
    ) -> MuxResult<u64> {
        let stream = self
            .headers
            .stream(stream_id)
            .ok_or(MuxError::UnknownStream { stream_id })?;
        if coded_timestamp(pts, stream_id, self.headers.main.time_base_count()).is_none() {
            return Err(MuxError::InvalidTimestamp {
                stream_id,
                pts: i64::try_from(pts).unwrap_or(i64::MAX),
            });
        }
        let frame_code = self.headers.main.frame_codes.get(FrameCodeTable::GENERIC_CODE);
        let header = encode_frame_header(stream, frame_code, pts, data.len() as u64);

        if self.needs_syncpoint(io.position(), data.len() as u64) {
            self.write_syncpoint(io, stream_id, pts)?;
        }

        let start = io.position();
        io.write_all(header.as_slice())?;
        io.write_all(data)?;

        self.record_keyframe(stream_id, pts);
        self.frames_per_stream[stream_id as usize] += 1;
        trace!(
            "NUT: 帧 stream={} pts={} size={} pos={}",
            stream_id,
            pts,
            data.len(),
            start
        );
        Ok(io.position() - start)
    }

    /// 写入索引, 没有同步点时不写, 返回是否写入
    pub fn write_index(&mut self, io: &mut IoContext) -> MuxResult<bool> {
        if self.syncpoints.is_empty() {
            return Ok(false);
        }
        let mut body = self.encode_index_body();
        // index_ptr: 从索引包起始到文件末尾的字节数
        let total = packet_size(body.len() + 8);
        body.put_u64(total);
        write_packet(io, INDEX_STARTCODE, body.as_slice())?;
        debug!(
            "NUT: 索引已写入, {} 个同步点, {} 字节",
            self.syncpoints.len(),
            total
        );
        Ok(true)
    }

    /// 已写出的同步点数
    pub fn syncpoint_count(&self) -> usize {
        self.syncpoints.len()
    }

    /// 每条流已写出的帧数
    pub fn frames_per_stream(&self) -> &[u64] {
        &self.frames_per_stream
    }

    /// 已写出的总帧数
    pub fn frames_written(&self) -> u64 {
        self.frames_per_stream.iter().sum()
    }

    fn needs_syncpoint(&self, position: u64, size: u64) -> bool {
        match self.syncpoints.last() {
            None => true,
            Some(&last) => {
                position + size + FRAME_HEADER_SLACK
                    >= last + u64::from(self.headers.main.max_distance)
            }
        }
    }

    fn write_syncpoint(&mut self, io: &mut IoContext, stream_id: u32, pts: u64) -> MuxResult<()> {
        let pos = io.position();
        let back_ptr_div16 = self.syncpoints.last().map_or(0, |&prev| (pos - prev) >> 4);

        let mut payload = NutBuf::new();
        payload.put_t(pts, stream_id, self.headers.main.time_base_count());
        payload.put_v(back_ptr_div16);
        write_packet(io, SYNCPOINT_STARTCODE, payload.as_slice())?;

        self.syncpoints.push(pos);
        for stream in &mut self.keyframe_pts {
            stream.push(None);
        }
        trace!("NUT: 同步点 #{} pos={}", self.syncpoints.len(), pos);
        Ok(())
    }

    fn record_keyframe(&mut self, stream_id: u32, pts: u64) {
        if let Some(slot) = self.keyframe_pts[stream_id as usize].last_mut() {
            slot.get_or_insert(pts);
        }

        let time_base = |id: u32| self.headers.main.time_bases[id as usize];
        let replace = match self.max_pts {
            None => true,
            Some((max, max_stream)) => {
                compare_ts(pts, time_base(stream_id), max, time_base(max_stream)).is_gt()
            }
        };
        if replace {
            self.max_pts = Some((pts, stream_id));
        }
    }

    /// 索引负载 (不含 index_ptr)
    fn encode_index_body(&self) -> NutBuf {
        let time_base_count = self.headers.main.time_base_count();
        let mut buf = NutBuf::new();

        let (max_pts, max_stream) = self.max_pts.unwrap_or((0, 0));
        buf.put_t(max_pts, max_stream, time_base_count);

        buf.put_v(self.syncpoints.len() as u64);
        let mut last = 0;
        for &pos in &self.syncpoints {
            buf.put_v((pos >> 4) - last);
            last = pos >> 4;
        }

        for keyframes in &self.keyframe_pts {
            encode_stream_index(&mut buf, keyframes);
        }
        buf
    }
}

/// 帧头: 帧码、标志、流 ID、完整 pts、长度和 CRC
fn encode_frame_header(
    stream: &StreamHeader,
    frame_code: &FrameCode,
    pts: u64,
    size: u64,
) -> NutBuf {
    let mut buf = NutBuf::new();
    buf.put_u8(FrameCodeTable::GENERIC_CODE);
    buf.put_v(CODED_FRAME_FLAGS.bits());
    buf.put_v(u64::from(stream.stream_id));
    buf.put_v(pts + (1u64 << stream.msb_pts_shift));
    buf.put_v((size - frame_code.size_lsb) / frame_code.size_mul);
    let checksum = crc32(buf.as_slice());
    buf.put_u32(checksum);
    buf
}

/// 一条流的关键帧标志和 pts 增量
///
/// 标志 h[j] 表示同步点 j-1 与 j 之间有关键帧, h[0] 恒为 false.
/// 最后一个同步点之后的关键帧不进入索引.
fn encode_stream_index(buf: &mut NutBuf, keyframes: &[Option<u64>]) {
    let count = keyframes.len();
    let mut flags = vec![None; count];
    let mut last_pts: i128 = -1;
    for j in 1..count {
        if let Some(pts) = keyframes[j - 1] {
            // 增量必须为正, 否则读取端会把它当作 EOR 记录
            if i128::from(pts) > last_pts {
                flags[j] = Some(pts);
                last_pts = i128::from(pts);
            }
        }
    }

    let mut last_pts: i128 = -1;
    for chunk in flags.chunks(INDEX_FLAG_CHUNK) {
        let mut bits = 1u64 << chunk.len();
        for (i, flag) in chunk.iter().enumerate() {
            if flag.is_some() {
                bits |= 1 << i;
            }
        }
        buf.put_v(bits << 1);
        for pts in chunk.iter().flatten() {
            buf.put_v((i128::from(*pts) - last_pts) as u64);
            last_pts = i128::from(*pts);
        }
    }
}

/// 比较两个不同时间基下的时间戳
fn compare_ts(a: u64, tb_a: Rational, b: u64, tb_b: Rational) -> std::cmp::Ordering {
    let lhs = u128::from(a) * u128::from(tb_a.num) * u128::from(tb_b.den);
    let rhs = u128::from(b) * u128::from(tb_b.num) * u128::from(tb_a.den);
    lhs.cmp(&rhs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::header::HeaderBuilder;
    use crate::stream::StreamDescriptor;

    fn writer(max_distance: u32) -> NutWriter {
        let headers = HeaderBuilder::new(*b"BGRA")
            .max_distance(max_distance)
            .build(&[
                StreamDescriptor::video(0, 25, 2, 2),
                StreamDescriptor::audio(1, 1000, 1000, 1),
            ])
            .unwrap();
        NutWriter::new(headers)
    }

    #[test]
    fn test_头部以文件标识开始() {
        let mut io = IoContext::memory();
        writer(32767).write_header(&mut io).unwrap();
        let data = io.data().unwrap();
        assert!(data.starts_with(FILE_ID));
        assert_eq!(
            &data[FILE_ID.len()..FILE_ID.len() + 8],
            &MAIN_STARTCODE.to_be_bytes()
        );
    }

    #[test]
    fn test_时间戳编码溢出时拒绝写入() {
        let mut w = writer(32767);
        let mut io = IoContext::memory();
        let err = w.write_frame(&mut io, 1, u64::MAX / 2 + 1, &[0u8; 4]).unwrap_err();
        assert!(matches!(err, MuxError::InvalidTimestamp { stream_id: 1, .. }));
        assert_eq!(io.position(), 0);
        assert_eq!(w.frames_written(), 0);
    }

    #[test]
    fn test_帧头字段() {
        let mut w = writer(32767);
        let mut io = IoContext::memory();
        w.write_frame(&mut io, 1, 5, &[0xAA; 3]).unwrap();
        let data = io.data().unwrap();
        assert_eq!(&data[..8], &SYNCPOINT_STARTCODE.to_be_bytes());

        // 同步点: 8 + 1 (fwd) + t(5*2+1=11) + back_ptr 0 + crc 4
        let frame = &data[8 + 1 + 2 + 4..];
        assert_eq!(&frame[..5], &[1, 121, 1, 6, 3]);
        assert_eq!(crc32(&frame[..9]), 0);
        assert_eq!(&frame[9..], &[0xAA; 3]);
        assert_eq!(w.frames_per_stream(), &[0, 1]);
    }

    #[test]
    fn test_同步点间距() {
        let mut w = writer(64);
        let mut io = IoContext::memory();
        for pts in 0..4 {
            w.write_frame(&mut io, 0, pts, &[0u8; 40]).unwrap();
        }
        // 每帧 40 字节 + 30 的余量已超过 64, 每帧前都有同步点
        assert_eq!(w.syncpoint_count(), 4);

        let mut w = writer(32767);
        let mut io = IoContext::memory();
        for pts in 0..4 {
            w.write_frame(&mut io, 0, pts, &[0u8; 40]).unwrap();
        }
        assert_eq!(w.syncpoint_count(), 1);
    }

    #[test]
    fn test_未知流() {
        let mut io = IoContext::memory();
        let err = writer(32767).write_frame(&mut io, 7, 0, &[1]).unwrap_err();
        assert!(matches!(err, MuxError::UnknownStream { stream_id: 7 }));
        assert_eq!(io.position(), 0);
    }

    #[test]
    fn test_无同步点不写索引() {
        let mut io = IoContext::memory();
        assert!(!writer(32767).write_index(&mut io).unwrap());
        assert_eq!(io.position(), 0);
    }

    #[test]
    fn test_索引指针指向索引起始() {
        let mut w = writer(64);
        let mut io = IoContext::memory();
        w.write_header(&mut io).unwrap();
        for pts in 0..3 {
            w.write_frame(&mut io, 0, pts, &[0u8; 40]).unwrap();
            w.write_frame(&mut io, 1, pts * 40, &[0u8; 8]).unwrap();
        }
        let index_start = io.position();
        assert!(w.write_index(&mut io).unwrap());
        let data = io.data().unwrap();
        let tail: [u8; 8] = data[data.len() - 12..data.len() - 4].try_into().unwrap();
        let index_ptr = u64::from_be_bytes(tail);
        assert_eq!(data.len() as u64 - index_ptr, index_start);
        assert_eq!(
            &data[index_start as usize..index_start as usize + 8],
            &INDEX_STARTCODE.to_be_bytes()
        );
    }

    #[test]
    fn test_流索引编码() {
        let mut buf = NutBuf::new();
        // 3 个同步点: 同步点 0 后有关键帧 pts 4, 同步点 1 后没有, 同步点 2 后的不计入
        encode_stream_index(&mut buf, &[Some(4), None, Some(9)]);
        // 标志 h = [0, 1, 0]: ((1 << 3) | 0b010) << 1 = 20, 增量 4 - (-1) = 5
        assert_eq!(buf.as_slice(), &[20, 5]);
    }

    #[test]
    fn test_流索引_pts_不递增时丢弃() {
        let mut buf = NutBuf::new();
        encode_stream_index(&mut buf, &[Some(4), Some(4), Some(6), None]);
        // h = [0, 1, 0, 1]: ((1 << 4) | 0b1010) << 1 = 52, 增量 5, 2
        assert_eq!(buf.as_slice(), &[52, 5, 2]);
    }

    #[test]
    fn test_compare_ts_跨时间基() {
        use std::cmp::Ordering;
        let a = Rational::per_second(25);
        let b = Rational::per_second(1000);
        assert_eq!(compare_ts(1, a, 40, b), Ordering::Equal);
        assert_eq!(compare_ts(1, a, 41, b), Ordering::Less);
    }
}
