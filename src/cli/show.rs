use clap::Parser;
use serde_json::json;

use super::gallery_builder;
use crate::cli::SubCommandExtend;
use crate::config::{Opts, OutputFormat};

#[derive(Parser, Debug, Clone)]
pub struct ShowCommand {
    /// 图片 ID
    pub id: i64,
    /// 输出格式
    #[arg(long, value_enum, value_name = "FORMAT", default_value_t = OutputFormat::Table)]
    pub output_format: OutputFormat,
}

impl SubCommandExtend for ShowCommand {
    async fn run(&self, opts: &Opts) -> anyhow::Result<()> {
        let gallery = gallery_builder(opts).open().await?;
        let image = gallery.get(self.id).await?;

        match self.output_format {
            OutputFormat::Json => {
                let value = json!({
                    "id": image.id,
                    "filename": image.filename,
                    "mimeType": image.mime_type,
                    "width": image.width,
                    "height": image.height,
                    "size": image.size,
                    "source": image.source,
                    "uploadedAt": image.uploaded_at,
                    "dimension": image.feature_vector.dim(),
                });
                println!("{}", serde_json::to_string_pretty(&value)?);
            }
            OutputFormat::Table => {
                println!("id\t{}", image.id);
                println!("filename\t{}", image.filename);
                println!("mime_type\t{}", image.mime_type);
                println!("size\t{}x{}, {} bytes", image.width, image.height, image.size);
                println!("source\t{}", image.source);
                println!("uploaded_at\t{}", image.uploaded_at.to_rfc3339());
                println!("dimension\t{}", image.feature_vector.dim());
            }
        }

        Ok(())
    }
}
