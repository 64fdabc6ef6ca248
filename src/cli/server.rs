use std::sync::Arc;
use std::time::Duration;

use anyhow::anyhow;
use clap::Parser;
use log::info;
use tokio::net::TcpListener;

use super::gallery_builder;
use crate::cli::SubCommandExtend;
use crate::config::{IngestOptions, Opts, SearchOptions};
use crate::extractor::ImageExtractor;
use crate::metrics::{self, PushConfig};
use crate::server;

#[derive(Parser, Debug, Clone)]
pub struct ServerCommand {
    #[command(flatten)]
    pub search: SearchOptions,
    #[command(flatten)]
    pub ingest: IngestOptions,
    /// 监听地址
    #[arg(long, default_value = "127.0.0.1:8000")]
    pub addr: String,
    /// prometheus 主动推送地址
    #[arg(long, value_name = "URL")]
    pub prometheus_push: Option<String>,
    /// 自定义 instance 标签值
    #[arg(long, value_name = "NAME")]
    pub prometheus_instance: Option<String>,
    /// prometheus 认证信息，格式为 username:password
    #[arg(long, value_name = "AUTH")]
    pub prometheus_auth: Option<String>,
    /// prometheus 推送间隔，单位为秒
    #[arg(long, value_name = "SECONDS", default_value_t = 30)]
    pub prometheus_interval: u64,
}

impl ServerCommand {
    fn push_config(&self) -> anyhow::Result<Option<PushConfig>> {
        let Some(url) = self.prometheus_push.clone() else {
            return Ok(None);
        };
        let auth = match &self.prometheus_auth {
            Some(s) => {
                let (username, password) =
                    s.split_once(':').ok_or_else(|| anyhow!("认证信息格式应为 username:password"))?;
                Some((username.to_string(), password.to_string()))
            }
            None => None,
        };
        Ok(Some(PushConfig {
            url,
            instance: self.prometheus_instance.clone().unwrap_or_else(|| self.addr.clone()),
            auth,
            interval: Duration::from_secs(self.prometheus_interval.max(1)),
        }))
    }
}

impl SubCommandExtend for ServerCommand {
    async fn run(&self, opts: &Opts) -> anyhow::Result<()> {
        let push = self.push_config()?;

        let gallery = gallery_builder(opts)
            .max_limit(self.search.max_limit)
            .max_upload(self.ingest.max_upload)
            .extractor(Arc::new(ImageExtractor::new(self.ingest.jpeg_quality)))
            .open()
            .await?;
        info!("已加载 {} 张图片", gallery.count().await?);

        // 创建应用状态
        let state = server::AppState::new(gallery, self.search.limit, self.ingest.max_upload);

        // 创建应用
        let app = server::create_app(state);

        if let Some(push) = push {
            info!("定期推送指标到 {}", push.url);
            metrics::spawn_push(push);
        }

        // 启动服务器
        info!("服务器启动：http://{}", &self.addr);
        let listener = TcpListener::bind(&self.addr).await?;
        axum::serve(listener, app).await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn command(args: &[&str]) -> ServerCommand {
        let mut argv = vec!["server"];
        argv.extend_from_slice(args);
        ServerCommand::try_parse_from(argv).unwrap()
    }

    #[test]
    fn test_push_config() {
        assert!(command(&[]).push_config().unwrap().is_none());

        let config = command(&["--prometheus-push", "http://gw:9091", "--prometheus-auth", "u:p:x"])
            .push_config()
            .unwrap()
            .unwrap();
        assert_eq!(config.instance, "127.0.0.1:8000");
        assert_eq!(config.auth, Some(("u".to_string(), "p:x".to_string())));

        assert!(command(&["--prometheus-push", "x", "--prometheus-auth", "nocolon"]).push_config().is_err());
    }
}
