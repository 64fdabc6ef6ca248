use std::convert::Infallible;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::LazyLock;

use clap::builder::RangedU64ValueParser;
use clap::{Parser, Subcommand, ValueEnum};
use directories::ProjectDirs;

use crate::cli::*;
use crate::ingest::MAX_UPLOAD;
use crate::ranking::{DEFAULT_LIMIT, MAX_LIMIT, MAX_LIMIT_CEILING};
use crate::store::Backend;

static CONF_DIR: LazyLock<String> = LazyLock::new(|| match ProjectDirs::from("", "imsim", "imsim") {
    Some(dirs) => dirs.config_dir().to_string_lossy().to_string(),
    None => ".imsim".to_string(),
});

fn default_config_dir() -> &'static str {
    CONF_DIR.as_str()
}

#[derive(Parser, Debug, Clone)]
pub struct StoreOptions {
    /// 存储后端，memory 模式下数据不会保存到硬盘
    #[arg(long, value_enum, default_value_t = Backend::Sqlite)]
    pub backend: Backend,
    /// 不使用 SQLite 的 WAL 模式
    #[arg(long)]
    pub no_wal: bool,
}

#[derive(Parser, Debug, Clone)]
pub struct SearchOptions {
    /// 返回的结果数量
    #[arg(long, value_name = "COUNT", default_value_t = DEFAULT_LIMIT)]
    pub limit: usize,
    /// 允许请求的最大结果数量
    #[arg(
        long,
        value_name = "COUNT",
        default_value_t = MAX_LIMIT,
        value_parser = RangedU64ValueParser::<usize>::new().range(1..=MAX_LIMIT_CEILING as u64)
    )]
    pub max_limit: usize,
}

#[derive(Parser, Debug, Clone)]
pub struct IngestOptions {
    /// 上传图片的最大字节数
    #[arg(long, value_name = "BYTES", default_value_t = MAX_UPLOAD)]
    pub max_upload: usize,
    /// 存储图片的 JPEG 质量
    #[arg(long, value_name = "QUALITY", default_value_t = 85, value_parser = clap::value_parser!(u8).range(1..=100))]
    pub jpeg_quality: u8,
}

#[derive(Parser, Debug, Clone)]
#[command(name = "imsim", version)]
pub struct Opts {
    #[command(subcommand)]
    pub subcmd: SubCommand,
    /// imsim 配置文件目录
    #[arg(short, long, default_value = default_config_dir())]
    pub conf_dir: ConfDir,
    #[command(flatten)]
    pub store: StoreOptions,
}

#[derive(Subcommand, Debug, Clone)]
pub enum SubCommand {
    /// 添加目录中的图片到数据库
    Add(AddCommand),
    /// 搜索与指定图片相似的图片
    Search(SearchCommand),
    /// 显示图片信息
    Show(ShowCommand),
    /// 查看或清空搜索历史
    History(HistoryCommand),
    /// 启动 HTTP 服务
    Server(ServerCommand),
}

#[derive(Debug, Clone)]
pub struct ConfDir {
    path: PathBuf,
}

impl ConfDir {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        self.path.as_path()
    }

    /// 返回数据库文件的路径
    pub fn database(&self) -> PathBuf {
        self.path.join("imsim.db")
    }
}

impl FromStr for ConfDir {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::new(s))
    }
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Json,
    Table,
}
