use clap::Parser;
use log::info;
use serde_json::json;

use super::gallery_builder;
use crate::cli::SubCommandExtend;
use crate::config::{Opts, OutputFormat};

#[derive(Parser, Debug, Clone)]
pub struct HistoryCommand {
    /// 清空所有搜索历史
    #[arg(long)]
    pub clear: bool,
    /// 输出格式
    #[arg(long, value_enum, value_name = "FORMAT", default_value_t = OutputFormat::Table)]
    pub output_format: OutputFormat,
}

impl SubCommandExtend for HistoryCommand {
    async fn run(&self, opts: &Opts) -> anyhow::Result<()> {
        let gallery = gallery_builder(opts).open().await?;

        if self.clear {
            gallery.clear_history().await?;
            info!("搜索历史已清空");
            return Ok(());
        }

        let history = gallery.list_history().await?;
        match self.output_format {
            OutputFormat::Json => {
                let items = history
                    .iter()
                    .map(|item| {
                        json!({
                            "id": item.entry.id,
                            "sourceImageId": item.entry.source_image_id,
                            "resultCount": item.entry.result_count,
                            "searchedAt": item.entry.searched_at,
                            "filename": item.source_image.filename,
                        })
                    })
                    .collect::<Vec<_>>();
                println!("{}", serde_json::to_string_pretty(&items)?);
            }
            OutputFormat::Table => {
                for item in &history {
                    println!(
                        "{}\t{}\t{}\t{}",
                        item.entry.searched_at.to_rfc3339(),
                        item.entry.source_image_id,
                        item.source_image.filename,
                        item.entry.result_count
                    );
                }
            }
        }

        Ok(())
    }
}
