//! I/O 抽象层.
//!
//! 封装器只向前顺序写出字节, 不回填也不 seek. [`IoContext`] 统计已写出的字节数,
//! 该位置用于同步点间距判断和索引中的同步点偏移.

use std::io::{self, BufWriter, Write};

use nutmux_core::MuxResult;

/// 文件输出缓冲区大小 (32 KB)
const DEFAULT_BUFFER_SIZE: usize = 32 * 1024;

/// I/O 上下文
///
/// 为封装器提供统一的字节输出接口, 后端可以是文件、任意 `Write` 或内存缓冲区.
pub struct IoContext {
    /// 内部 I/O 实现
    inner: Box<dyn IoBackend>,
    /// 已写出的字节数
    written: u64,
}

/// I/O 后端 trait
///
/// 实现此 trait 以支持不同的输出目标.
pub trait IoBackend: Send {
    /// 全部写入
    fn write_all(&mut self, buf: &[u8]) -> io::Result<()>;
    /// 刷新缓冲
    fn flush(&mut self) -> io::Result<()>;
    /// 内存后端返回已写入的数据, 其他后端返回 `None`
    fn data(&self) -> Option<&[u8]> {
        None
    }
}

impl IoContext {
    /// 从 I/O 后端创建上下文
    pub fn new(backend: Box<dyn IoBackend>) -> Self {
        Self {
            inner: backend,
            written: 0,
        }
    }

    /// 创建写入内存缓冲区的上下文
    pub fn memory() -> Self {
        Self::new(Box::new(MemoryBackend::new()))
    }

    /// 包装任意 `Write` 实现
    pub fn from_writer<W: Write + Send + 'static>(writer: W) -> Self {
        Self::new(Box::new(WriterBackend { writer }))
    }

    /// 从文件路径打开 (写入, 截断已有文件)
    pub fn open_write(path: &str) -> MuxResult<Self> {
        let file = std::fs::File::create(path)?;
        Ok(Self::from_writer(BufWriter::with_capacity(
            DEFAULT_BUFFER_SIZE,
            file,
        )))
    }

    /// 写入全部数据
    pub fn write_all(&mut self, buf: &[u8]) -> MuxResult<()> {
        self.inner.write_all(buf)?;
        self.written += buf.len() as u64;
        Ok(())
    }

    /// 写入 u8
    pub fn write_u8(&mut self, v: u8) -> MuxResult<()> {
        self.write_all(&[v])
    }

    /// 写入 u32 大端
    pub fn write_u32_be(&mut self, v: u32) -> MuxResult<()> {
        self.write_all(&v.to_be_bytes())
    }

    /// 写入 u64 大端
    pub fn write_u64_be(&mut self, v: u64) -> MuxResult<()> {
        self.write_all(&v.to_be_bytes())
    }

    /// 刷新底层缓冲
    pub fn flush(&mut self) -> MuxResult<()> {
        self.inner.flush()?;
        Ok(())
    }

    /// 当前写入位置 (自开始以来写出的字节数)
    pub fn position(&self) -> u64 {
        self.written
    }

    /// 内存后端中已写入的数据
    pub fn data(&self) -> Option<&[u8]> {
        self.inner.data()
    }
}

/// 通用 `Write` 后端
struct WriterBackend<W> {
    writer: W,
}

impl<W: Write + Send> IoBackend for WriterBackend<W> {
    fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        self.writer.write_all(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.writer.flush()
    }
}

/// 内存缓冲区 I/O 后端
///
/// 用于测试和内存中处理.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    /// 数据缓冲区
    data: Vec<u8>,
}

impl MemoryBackend {
    /// 创建空缓冲区
    pub fn new() -> Self {
        Self { data: Vec::new() }
    }
}

impl IoBackend for MemoryBackend {
    fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        self.data.extend_from_slice(buf);
        Ok(())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }

    fn data(&self) -> Option<&[u8]> {
        Some(&self.data)
    }
}
