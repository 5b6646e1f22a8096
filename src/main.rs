// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # tinyserver
//!
//! 基于固定大小线程池的 HTTP/1.1 文件服务器。
//! 核心功能包括：
//! - 工作线程池与同步任务队列
//! - 支持 keep-alive 与空闲超时的连接状态机
//! - 静态文件、目录列表以及 JSON/文本资源的 POST 写入
//! - 后台管理控制台（CLI 指令交互）

use log::{error, info};

use std::io::{self, BufRead};
use std::process;
use std::thread;

use tinyserver::{Config, Server, ServerHandle};

const LOG_CONFIG: &str = "config/log4rs.yaml";
const SERVER_CONFIG: &str = "config/development.toml";

/// # 程序入口点
///
/// 初始化日志、加载配置、创建线程池并启动接收循环。
fn main() {
    // 1. 初始化日志系统：通过外部 YAML 配置级别与输出目的地
    if let Err(e) = log4rs::init_file(LOG_CONFIG, Default::default()) {
        eprintln!("无法从{}初始化日志系统：{}", LOG_CONFIG, e);
        process::exit(1);
    }

    // 2. 环境配置加载：从 TOML 文件读取运行参数
    let config = match Config::from_toml(SERVER_CONFIG) {
        Ok(config) => config,
        Err(e) => {
            error!("{}：{}", e, SERVER_CONFIG);
            process::exit(1);
        }
    };
    info!("配置文件已载入");

    // 3. 创建线程池并绑定端口
    let server = match Server::new(config) {
        Ok(server) => server,
        Err(e) => {
            error!("服务器启动失败：{}", e);
            process::exit(1);
        }
    };

    // 4. 启动交互式管理控制台线程，不阻塞接收循环
    let handle = server.handle();
    let console = thread::Builder::new()
        .name("tinyserver-console".to_string())
        .spawn(move || console_loop(handle));
    if let Err(e) = console {
        error!("无法启动管理控制台：{}", e);
    }

    // 5. 主循环，直到收到停机指令
    server.run();
}

fn console_loop(handle: ServerHandle) {
    let stdin = io::stdin();
    for line in stdin.lock().lines() {
        let input = match line {
            Ok(input) => input,
            Err(_) => break,
        };
        let cmd = input.trim();
        match cmd {
            "stop" => {
                println!("停机指令已激活，服务器将在处理完队列中的连接后关闭...");
                handle.stop();
                break;
            }
            "help" => {
                println!("== tinyserver Help ==");
                println!("stop   - 发出停机信号");
                println!("status - 查看当前服务器运行状态");
                println!("help   - 显示此帮助信息");
                println!("====================");
            }
            "status" => {
                println!("== tinyserver 状态 ==");
                println!("监听地址: {}", handle.local_addr());
                println!("当前活跃连接数: {}", handle.active_connections());
                match handle.pool_status() {
                    Some(status) => {
                        println!("工作线程数: {}", status.active_workers);
                        println!("忙碌线程数: {}", status.working_workers);
                        println!("排队任务数: {}", status.queued_tasks);
                    }
                    None => println!("线程池: 未启用"),
                }
                println!("====================");
            }
            "" => {}
            _ => {
                println!("无效的命令：{}", cmd);
            }
        }
    }
}
