use clap::Parser;
use multichat::{
    init_logging, ApiCredential, AppConfig, ChatMessage, ChatService, SamplingParams, Session,
    UploadedDocument,
};
use tokio::sync::Mutex;
use tracing::error;

/// 在终端里向所有配置的模型提一个问题。
#[derive(Parser, Debug)]
#[command(name = "multichat-cli", version, about)]
struct Cli {
    /// 作为上下文的文档（.txt, .md, .pdf, .docx），最多使用前 5 个
    #[arg(short, long = "file")]
    files: Vec<String>,

    /// 某个模型的温度，格式 `模型名=值`
    #[arg(long = "temperature", value_parser = parse_assignment)]
    temperatures: Vec<(String, f64)>,

    /// 某个模型的 top-p，格式 `模型名=值`
    #[arg(long = "top-p", value_parser = parse_assignment)]
    top_ps: Vec<(String, f64)>,

    /// 配置文件路径，默认使用系统配置目录
    #[arg(short, long)]
    config: Option<String>,

    /// 要提的问题
    prompt: String,
}

fn parse_assignment(raw: &str) -> Result<(String, f64), String> {
    let (name, value) = raw
        .rsplit_once('=')
        .ok_or_else(|| format!("应为 模型名=值，实际为 {}", raw))?;
    let value: f64 = value.trim().parse().map_err(|e| format!("{}: {}", raw, e))?;
    Ok((name.trim().to_string(), value))
}

#[tokio::main]
async fn main() {
    init_logging();
    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        error!("{}", e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let config = match &cli.config {
        Some(path) => AppConfig::load_from(path)?,
        None => AppConfig::load()?,
    };
    let service = ChatService::from_config(&config, ApiCredential::from_env());
    let mut session = Session::new(&config);

    let mut documents = Vec::new();
    for path in &cli.files {
        documents.push(UploadedDocument::from_path(path)?);
    }
    session.replace_documents(documents);

    for (name, temperature) in &cli.temperatures {
        let current = session.params(name)?;
        session.set_params(name, SamplingParams::new(*temperature, current.top_p)?)?;
    }
    for (name, top_p) in &cli.top_ps {
        let current = session.params(name)?;
        session.set_params(name, SamplingParams::new(current.temperature, *top_p)?)?;
    }

    let session = Mutex::new(session);
    let outcome = service.submit(&session, &cli.prompt).await?;

    for failure in &outcome.failures {
        eprintln!("{}", failure.message);
    }

    let session = session.lock().await;
    // 按配置顺序输出，与侧边栏顺序一致
    if let Some(results) = session.history().last().and_then(ChatMessage::results) {
        for model in session.models() {
            if let Some(result) = results.get(&model.name) {
                println!("📦 {} ({})", model.name, result.headline());
                println!("{}", result.params_caption());
                println!("{}\n", result.text);
            }
        }
    }
    Ok(())
}
