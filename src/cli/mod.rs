mod add;
mod history;
mod search;
pub mod server;
mod show;

pub use add::*;
pub use history::*;
pub use search::*;
pub use server::*;
pub use show::*;

use crate::GalleryBuilder;
use crate::config::Opts;

pub trait SubCommandExtend {
    fn run(&self, opts: &Opts) -> impl std::future::Future<Output = anyhow::Result<()>> + Send;
}

/// 根据全局选项创建图片库
fn gallery_builder(opts: &Opts) -> GalleryBuilder {
    GalleryBuilder::new(opts.conf_dir.clone())
        .backend(opts.store.backend)
        .wal(!opts.store.no_wal)
}
