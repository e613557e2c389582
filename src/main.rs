use clap::{Parser, Subcommand};
use cn_port_guard::error::{GuardError, Result};
use cn_port_guard::host::FirewallBackend;
use cn_port_guard::probe::{
    check_reachability, BrowserProber, IpResolver, PingPeExtractor, DEFAULT_PROBE_URL,
};
use cn_port_guard::provision::{self, ProvisionSettings, SearchPolicy, DEFAULT_MAX_ATTEMPTS};
use cn_port_guard::utils::{PortRange, DEFAULT_PORT_MAX, DEFAULT_PORT_MIN};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info, Level};

/// cn-port-guard: keep a proxy port reachable from mainland China
///
/// cn-port-guard: 检测端口在中国大陆的可达性，不可达时自动更换端口
#[derive(Parser, Debug)]
#[command(name = "cn-port-guard")]
#[command(author = "zzzzyg")]
#[command(version)]
#[command(about = "Check and provision a proxy port reachable from mainland China", long_about = None)]
struct Args {
    /// Log level (trace, debug, info, warn, error)
    ///
    /// 日志级别 (trace, debug, info, warn, error)
    #[arg(short = 'l', long, default_value = "info", global = true)]
    log_level: String,

    /// Probe aggregator base URL
    ///
    /// 多地区 TCP 探测站点地址
    #[arg(long, default_value = DEFAULT_PROBE_URL, global = true)]
    probe_url: String,

    /// Chromium executable path (auto-detect if not specified)
    ///
    /// Chromium 可执行文件路径（不指定则自动查找）
    #[arg(long, global = true)]
    chromium_path: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Check whether <PORT> on this host is reachable from CN, prints True or False
    ///
    /// 检测本机端口在中国大陆是否可达，输出 True 或 False
    Check {
        /// Port to check
        ///
        /// 要检测的端口
        port: Option<u16>,
    },

    /// Find a reachable port, write it into the config and restart the service
    ///
    /// 寻找可达端口，写入配置并重启服务
    Provision {
        /// Proxy config file (JSON with "inbounds")
        ///
        /// 代理配置文件
        #[arg(short, long, default_value = "config.json")]
        config: PathBuf,

        /// System path the proxy service reads its config from
        ///
        /// 代理服务读取配置的系统路径
        #[arg(long, default_value = "/etc/xray/config.json")]
        deploy_path: PathBuf,

        /// Compose file used to restart the service (default: compose.yaml next to the config)
        ///
        /// 用于重启服务的 compose 文件（默认与配置文件同目录）
        #[arg(long)]
        compose_file: Option<PathBuf>,

        /// Maximum number of ports to try
        ///
        /// 最多尝试的端口数
        #[arg(short = 'n', long, default_value_t = DEFAULT_MAX_ATTEMPTS,
              value_parser = clap::value_parser!(u32).range(1..))]
        max_attempts: u32,

        /// Lowest candidate port
        ///
        /// 候选端口下限
        #[arg(long, default_value_t = DEFAULT_PORT_MIN)]
        port_min: u16,

        /// Highest candidate port
        ///
        /// 候选端口上限
        #[arg(long, default_value_t = DEFAULT_PORT_MAX)]
        port_max: u16,

        /// Firewall used to open candidate ports
        ///
        /// 开放端口使用的防火墙
        #[arg(long, value_enum, default_value = "ufw")]
        firewall: FirewallBackend,

        /// Skip enabling BBR
        ///
        /// 跳过开启 BBR
        #[arg(long)]
        skip_bbr: bool,

        /// Never install Chromium automatically
        ///
        /// 不自动安装 Chromium
        #[arg(long)]
        skip_install: bool,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    let log_level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => {
            eprintln!("⚠️  Invalid log level '{}', using 'info'", args.log_level);
            Level::INFO
        }
    };

    // 日志输出到 stderr，stdout 只留给 True/False
    tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_writer(std::io::stderr)
        .init();

    match args.command {
        Command::Check { port } => {
            let report = match port {
                Some(port) => {
                    CheckReport::from(run_check(&args.probe_url, args.chromium_path, port).await)
                }
                None => CheckReport::Usage,
            };
            report.emit()
        }
        Command::Provision {
            config,
            deploy_path,
            compose_file,
            max_attempts,
            port_min,
            port_max,
            firewall,
            skip_bbr,
            skip_install,
        } => {
            let range = match PortRange::new(port_min, port_max) {
                Ok(range) => range,
                Err(e) => {
                    eprintln!("❌ {}", e);
                    return ExitCode::from(1);
                }
            };
            let compose_file = compose_file.unwrap_or_else(|| {
                config
                    .parent()
                    .map(|dir| dir.join("compose.yaml"))
                    .unwrap_or_else(|| PathBuf::from("compose.yaml"))
            });

            let settings = ProvisionSettings {
                config_path: config,
                deploy_path,
                compose_file,
                policy: SearchPolicy {
                    range,
                    max_attempts,
                },
                firewall,
                probe_url: args.probe_url,
                chromium_path: args.chromium_path,
                skip_bbr,
                allow_install: !skip_install,
            };

            info!("🚀 cn-port-guard provisioning...");
            info!("📋 Configuration:");
            info!("   Config: {:?}", settings.config_path);
            info!("   Deploy path: {:?}", settings.deploy_path);
            info!("   Compose file: {:?}", settings.compose_file);
            info!("   Port range: {}-{}", range.start(), range.end());
            info!("   Max attempts: {}", max_attempts);
            info!("   Firewall: {:?}", settings.firewall);

            run_provision(&settings).await
        }
    }
}

/// check 子命令的输出：stdout 只有 True/False，其余信息走 stderr
#[derive(Debug, PartialEq, Eq)]
enum CheckReport {
    Usage,
    Verdict(bool),
    Failed(String),
}

impl From<Result<bool>> for CheckReport {
    fn from(outcome: Result<bool>) -> Self {
        match outcome {
            Ok(reachable) => CheckReport::Verdict(reachable),
            Err(e) => CheckReport::Failed(e.to_string()),
        }
    }
}

impl CheckReport {
    fn stdout(&self) -> Option<&'static str> {
        match self {
            CheckReport::Verdict(true) => Some("True"),
            CheckReport::Verdict(false) => Some("False"),
            _ => None,
        }
    }

    fn stderr(&self) -> Option<String> {
        match self {
            CheckReport::Usage => Some("Usage: cn-port-guard check <PORT>".to_string()),
            CheckReport::Failed(reason) => Some(format!("❌ Connectivity check failed: {}", reason)),
            CheckReport::Verdict(_) => None,
        }
    }

    /// 得出结论（无论真假）即为 0
    fn exit_code(&self) -> u8 {
        match self {
            CheckReport::Verdict(_) => 0,
            _ => 1,
        }
    }

    fn emit(&self) -> ExitCode {
        if let Some(line) = self.stdout() {
            println!("{}", line);
        }
        if let Some(line) = self.stderr() {
            eprintln!("{}", line);
        }
        ExitCode::from(self.exit_code())
    }
}

async fn run_check(probe_url: &str, chromium_path: Option<PathBuf>, port: u16) -> Result<bool> {
    let ip = IpResolver::new()?.resolve_public_ip().await?;
    let prober = BrowserProber::new(probe_url, chromium_path);
    let extractor = PingPeExtractor::new()?;
    check_reachability(&prober, &extractor, ip, port).await
}

async fn run_provision(settings: &ProvisionSettings) -> ExitCode {
    let outcome = provision::run(settings).await;
    if let Ok(report) = &outcome {
        match report.bbr_enabled {
            Some(true) => info!("   BBR: enabled"),
            Some(false) => info!("   BBR: failed"),
            None => info!("   BBR: skipped"),
        }
    }

    match outcome {
        Ok(report) if report.confirmed => {
            info!("✅ Port {} on {} is live and reachable from CN", report.port, report.ip);
            println!("{}", report.port);
            ExitCode::SUCCESS
        }
        Ok(report) => {
            // 端口已提交，不回滚
            error!(
                "❌ Step '{}' failed: port {} was committed but is not reachable after restart",
                provision::sequence::STEP_CONFIRM,
                report.port
            );
            ExitCode::from(1)
        }
        Err(GuardError::StepFailed { step, source }) => {
            error!("❌ Step '{}' failed: {}", step, source);
            ExitCode::from(1)
        }
        Err(e) => {
            error!("❌ Provisioning failed: {}", e);
            ExitCode::from(1)
        }
    }
}
