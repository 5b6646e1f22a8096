// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # Socket 辅助函数
//!
//! - 监听 Socket：设置 `SO_REUSEADDR`，使用自定义的 backlog 长度；
//! - 就绪等待：带超时地等待连接上出现可读数据；
//! - 零拷贝发送：Linux 上使用 `sendfile(2)`，其它平台退化为 `io::copy`。

use std::fs::File;
use std::io;
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::time::Duration;

use log::debug;
use socket2::{Domain, Protocol, Socket, Type};

/// 一次就绪等待的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Readiness {
    /// 有数据可读
    Ready,
    /// 在超时时间内没有数据到达
    TimedOut,
    /// 对端已经关闭连接
    Closed,
}

/// 绑定并监听 `addr`，设置 `SO_REUSEADDR` 并使用给定的 backlog 长度。
pub fn bind_listener(addr: SocketAddr, backlog: i32) -> io::Result<TcpListener> {
    let socket = Socket::new(Domain::for_address(addr), Type::STREAM, Some(Protocol::TCP))?;
    socket.set_reuse_address(true)?;
    socket.bind(&addr.into())?;
    socket.listen(backlog)?;
    debug!("已在{}上监听，backlog为{}", addr, backlog);
    Ok(socket.into())
}

/// 等待连接变为可读，最长等待 `timeout`。
///
/// 通过读超时加 `peek` 实现，不会消耗任何数据。`timeout` 不能为 0。
pub fn wait_readable(stream: &TcpStream, timeout: Duration) -> io::Result<Readiness> {
    stream.set_read_timeout(Some(timeout))?;
    let mut probe = [0u8; 1];
    match stream.peek(&mut probe) {
        Ok(0) => Ok(Readiness::Closed),
        Ok(_) => Ok(Readiness::Ready),
        Err(e) if matches!(e.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut) => {
            Ok(Readiness::TimedOut)
        }
        Err(e) => Err(e),
    }
}

/// 把文件的前 `len` 个字节发送到 `stream`，返回实际发送的字节数。
#[cfg(target_os = "linux")]
pub fn send_file(stream: &mut TcpStream, file: &mut File, len: u64) -> io::Result<u64> {
    sys::send_file(stream, file, len)
}

#[cfg(not(target_os = "linux"))]
pub fn send_file(stream: &mut TcpStream, file: &mut File, len: u64) -> io::Result<u64> {
    use std::io::Read;
    io::copy(&mut file.take(len), stream)
}

#[cfg(target_os = "linux")]
mod sys {
    use std::fs::File;
    use std::io;
    use std::net::TcpStream;
    use std::os::unix::io::AsRawFd;

    // 单次 sendfile 的上限，与内核的 MAX_RW_COUNT 一致
    const MAX_SENDFILE_CHUNK: u64 = 0x7fff_f000;

    pub fn send_file(stream: &mut TcpStream, file: &mut File, len: u64) -> io::Result<u64> {
        let mut offset: libc::off_t = 0;
        let mut sent: u64 = 0;
        while sent < len {
            let chunk = (len - sent).min(MAX_SENDFILE_CHUNK) as usize;
            let n = unsafe {
                libc::sendfile(stream.as_raw_fd(), file.as_raw_fd(), &mut offset, chunk)
            };
            if n < 0 {
                let err = io::Error::last_os_error();
                if err.kind() == io::ErrorKind::Interrupted {
                    continue;
                }
                return Err(err);
            }
            if n == 0 {
                // 文件在发送过程中被截断
                break;
            }
            sent += n as u64;
        }
        Ok(sent)
    }
}
