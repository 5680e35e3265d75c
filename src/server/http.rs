//! HTTP服务器设置模块
//! 负责端口绑定、路由挂载与优雅关闭

use crate::api::routes;
use crate::util::config::Config;
use crate::AppState;
use anyhow::Result;
use axum::Router;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tokio::signal::ctrl_c;
use tracing::{info, warn};

/// HTTP服务器管理器
pub struct ServerManager;

impl ServerManager {
    /// 绑定端口并构建路由
    pub async fn create_server(config: &Config, app_state: AppState) -> Result<HttpServer> {
        let listener = Self::bind_listener(&config.server.host, config.server.port).await?;
        let local_addr = listener.local_addr()?;
        let app_routes = routes(app_state);

        info!(
            target: "server.http",
            event = "http.server.ready",
            address = %local_addr
        );

        Ok(HttpServer {
            listener,
            app_routes,
            local_addr,
        })
    }

    /// 通配地址优先尝试IPv6双栈，失败再降级IPv4；指定地址直接绑定
    async fn bind_listener(host: &str, port: u16) -> Result<TcpListener> {
        let host = host.trim();
        if !matches!(host, "" | "0.0.0.0" | "::" | "[::]") {
            let addr = if host.contains(':') && !host.starts_with('[') {
                format!("[{}]:{}", host, port)
            } else {
                format!("{}:{}", host, port)
            };
            let listener = TcpListener::bind(&addr)
                .await
                .map_err(|e| anyhow::anyhow!("地址 {} 绑定失败: {}", addr, e))?;
            info!(target: "server.http", event = "http.server.bound", address = %addr);
            return Ok(listener);
        }

        let v6_addr = format!("[::]:{}", port);
        match TcpListener::bind(&v6_addr).await {
            Ok(listener) => {
                info!(
                    target: "server.http",
                    event = "http.server.bound",
                    protocol = "ipv6",
                    address = %v6_addr
                );
                Ok(listener)
            }
            Err(e6) => {
                warn!("IPv6绑定失败: {}，尝试IPv4", e6);
                let v4_addr = format!("0.0.0.0:{}", port);
                let listener = TcpListener::bind(&v4_addr).await.map_err(|e4| {
                    anyhow::anyhow!(
                        "端口 {} 绑定失败 (IPv4): {}；之前IPv6错误: {}",
                        port,
                        e4,
                        e6
                    )
                })?;
                info!(
                    target: "server.http",
                    event = "http.server.bound",
                    protocol = "ipv4",
                    address = %v4_addr
                );
                Ok(listener)
            }
        }
    }

    /// 启动服务器，阻塞直到收到关闭信号
    pub async fn start_server(server: HttpServer) -> Result<()> {
        info!(
            target: "server.http",
            event = "http.server.start",
            address = %server.local_addr
        );

        axum::serve(server.listener, server.app_routes)
            .with_graceful_shutdown(Self::shutdown_signal())
            .await?;

        info!(target: "server.http", event = "http.server.stopped", "HTTP服务器已关闭");
        Ok(())
    }

    async fn shutdown_signal() {
        tokio::select! {
            _ = ctrl_c() => {
                info!(target: "server.http", event = "http.server.signal", signal = "SIGINT");
            }
            _ = Self::wait_for_unix_signal(UnixSignal::Terminate) => {
                info!(target: "server.http", event = "http.server.signal", signal = "SIGTERM");
            }
            _ = Self::wait_for_unix_signal(UnixSignal::Hangup) => {
                warn!(
                    target: "server.http",
                    event = "http.server.signal",
                    signal = "SIGHUP",
                    "不支持配置重载，准备退出"
                );
            }
        }
        info!(target: "server.http", event = "http.server.shutdown_begin");
    }

    #[cfg(unix)]
    async fn wait_for_unix_signal(kind: UnixSignal) {
        use tokio::signal::unix::{signal, SignalKind};

        let kind = match kind {
            UnixSignal::Terminate => SignalKind::terminate(),
            UnixSignal::Hangup => SignalKind::hangup(),
        };
        match signal(kind) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!("注册信号监听失败: {}", e);
                std::future::pending::<()>().await;
            }
        }
    }

    #[cfg(not(unix))]
    async fn wait_for_unix_signal(_kind: UnixSignal) {
        std::future::pending::<()>().await;
    }
}

#[derive(Debug, Clone, Copy)]
enum UnixSignal {
    Terminate,
    Hangup,
}

/// HTTP服务器实例
pub struct HttpServer {
    listener: TcpListener,
    app_routes: Router,
    local_addr: SocketAddr,
}

impl HttpServer {
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_bind_explicit_loopback_with_ephemeral_port() {
        let listener = ServerManager::bind_listener("127.0.0.1", 0).await.unwrap();
        let addr = listener.local_addr().unwrap();
        assert!(addr.ip().is_loopback());
        assert_ne!(addr.port(), 0);
    }

    #[tokio::test]
    async fn test_bind_wildcard_falls_back_when_needed() {
        let listener = ServerManager::bind_listener("0.0.0.0", 0).await.unwrap();
        assert!(listener.local_addr().unwrap().ip().is_unspecified());
    }
}
