use anyhow::Result;
use clap::Parser;
use serde::Serialize;

use super::gallery_builder;
use crate::cli::SubCommandExtend;
use crate::config::{Opts, OutputFormat, SearchOptions};
use crate::model::SimilarityResult;

#[derive(Parser, Debug, Clone)]
pub struct SearchCommand {
    #[command(flatten)]
    pub search: SearchOptions,
    /// 被搜索的图片 ID
    pub id: i64,
    /// 输出格式
    #[arg(long, value_enum, value_name = "FORMAT", default_value_t = OutputFormat::Table)]
    pub output_format: OutputFormat,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ResultRow<'a> {
    id: i64,
    filename: &'a str,
    width: u32,
    height: u32,
    similarity_score: f64,
}

impl SubCommandExtend for SearchCommand {
    async fn run(&self, opts: &Opts) -> anyhow::Result<()> {
        let gallery = gallery_builder(opts).max_limit(self.search.max_limit).open().await?;
        let result = gallery.find_similar(self.id, Some(self.search.limit)).await?;
        print_result(&result, self.output_format)
    }
}

fn print_result(result: &[SimilarityResult], format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => {
            let rows = result
                .iter()
                .map(|r| ResultRow {
                    id: r.id,
                    filename: &r.filename,
                    width: r.width,
                    height: r.height,
                    similarity_score: r.similarity_score,
                })
                .collect::<Vec<_>>();
            println!("{}", serde_json::to_string_pretty(&rows)?)
        }
        OutputFormat::Table => {
            for r in result {
                println!("{:.2}\t{}\t{}", r.similarity_score, r.id, r.filename);
            }
        }
    }
    Ok(())
}
