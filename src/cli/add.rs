use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use futures::StreamExt;
use indicatif::{ProgressBar, ProgressIterator};
use log::{info, warn};
use walkdir::WalkDir;

use super::gallery_builder;
use crate::Gallery;
use crate::cli::SubCommandExtend;
use crate::config::{IngestOptions, Opts};
use crate::extractor::ImageExtractor;
use crate::model::MimeType;
use crate::store::Backend;
use crate::utils::pb_style;

#[derive(Parser, Debug, Clone)]
pub struct AddCommand {
    #[command(flatten)]
    pub ingest: IngestOptions,
    /// 图片所在目录
    pub path: PathBuf,
    /// 扫描的文件后缀名，多个后缀用逗号分隔
    #[arg(short, long, default_value = "jpg,jpeg,png")]
    pub suffix: String,
    /// 同时处理的图片数量
    #[arg(short, long, default_value_t = 8)]
    pub jobs: usize,
}

/// 根据后缀名判断图片类型
fn guess_mime_type(path: &Path) -> Option<MimeType> {
    let ext = path.extension()?.to_string_lossy().to_ascii_lowercase();
    match ext.as_str() {
        "jpg" | "jpeg" => Some(MimeType::Jpeg),
        "png" => Some(MimeType::Png),
        _ => None,
    }
}

async fn add_file(gallery: &Gallery, path: &Path) -> anyhow::Result<i64> {
    let mime_type = guess_mime_type(path).context("无法识别的图片类型")?;
    let data = tokio::fs::read(path).await?;
    let filename = path.file_name().map(|s| s.to_string_lossy()).unwrap_or_default();
    let record = gallery.ingest(data, mime_type.as_str(), &filename).await?;
    Ok(record.id)
}

impl SubCommandExtend for AddCommand {
    async fn run(&self, opts: &Opts) -> anyhow::Result<()> {
        if opts.store.backend == Backend::Memory {
            warn!("当前使用内存存储，添加的图片不会被保存");
        }

        let gallery = gallery_builder(opts)
            .max_upload(self.ingest.max_upload)
            .extractor(Arc::new(ImageExtractor::new(self.ingest.jpeg_quality)))
            .open()
            .await?;

        let suffixes = self.suffix.split(',').map(|s| s.trim().to_ascii_lowercase()).collect::<Vec<_>>();

        info!("开始扫描目录: {}", self.path.display());
        let pb2 = ProgressBar::no_length().with_style(pb_style());
        let entries = WalkDir::new(&self.path)
            .sort_by_file_name()
            .into_iter()
            .progress_with(pb2)
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.into_path())
            .filter(|path| {
                path.is_file()
                    && path
                        .extension()
                        .is_some_and(|ext| suffixes.contains(&ext.to_string_lossy().to_ascii_lowercase()))
            })
            .collect::<Vec<_>>();
        info!("扫描完成，共 {} 张图片", entries.len());

        let pb = ProgressBar::new(entries.len() as u64).with_style(pb_style());
        let mut added = 0;
        let mut failed = 0;

        let mut results = futures::stream::iter(entries)
            .map(|path| {
                let gallery = &gallery;
                async move {
                    let result = add_file(gallery, &path).await;
                    (path, result)
                }
            })
            .buffer_unordered(self.jobs.max(1));

        while let Some((path, result)) = results.next().await {
            match result {
                Ok(id) => {
                    added += 1;
                    pb.set_message(format!("{id}: {}", path.display()));
                }
                Err(e) => {
                    failed += 1;
                    pb.println(format!("添加失败 {}: {e:#}", path.display()));
                }
            }
            pb.inc(1);
        }

        pb.finish_with_message("图片添加完成");
        info!("成功 {added} 张，失败 {failed} 张，数据库中共 {} 张图片", gallery.count().await?);

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_guess_mime_type() {
        assert_eq!(guess_mime_type(Path::new("a/b.JPG")), Some(MimeType::Jpeg));
        assert_eq!(guess_mime_type(Path::new("b.jpeg")), Some(MimeType::Jpeg));
        assert_eq!(guess_mime_type(Path::new("c.png")), Some(MimeType::Png));
        assert_eq!(guess_mime_type(Path::new("d.gif")), None);
        assert_eq!(guess_mime_type(Path::new("noext")), None);
    }
}
