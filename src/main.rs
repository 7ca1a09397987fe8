mod logging;
mod models;
mod scenario;
mod simulation;

use std::fs;

use clap::{Arg, Command};
use logging::{LogConfig, LogOutput};
use scenario::ScenarioConfig;
use simulation::{SimulationEngine, SimulationReport};
use tracing::info;

/// --test で実行する組み込みシナリオ
const DEMO_SCENARIO: &str = include_str!("../scenarios/demo_duel.yaml");

fn main() {
    let matches = Command::new("shipsim")
        .version("0.1.0")
        .about("宇宙戦闘シミュレーション (Space Combat Simulation)")
        .long_about("3次元空間での艦隊戦闘シミュレーション\n\
                     各艦はプレイヤーの入力スクリプトまたはユニットAIで操縦されます。")
        .arg(
            Arg::new("scenario")
                .short('s')
                .long("scenario")
                .value_name("FILE")
                .help("シナリオファイル(.yaml)のパスを指定")
        )
        .arg(
            Arg::new("info")
                .short('i')
                .long("info")
                .action(clap::ArgAction::SetTrue)
                .help("シナリオの情報のみ表示して終了")
                .conflicts_with("test")
        )
        .arg(
            Arg::new("test")
                .short('t')
                .long("test")
                .action(clap::ArgAction::SetTrue)
                .help("組み込みのデモシナリオ（1対1の決闘）を実行")
                .conflicts_with("scenario")
        )
        .arg(
            Arg::new("report")
                .short('r')
                .long("report")
                .value_name("FILE")
                .help("結果レポートをYAMLで書き出すファイル")
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .action(clap::ArgAction::Count)
                .help("詳細出力レベル (-v: 基本, -vv: 詳細, -vvv: デバッグ)")
        )
        .arg(
            Arg::new("log-level")
                .long("log-level")
                .value_name("LEVEL")
                .help("ログレベル (trace, debug, info, warn, error)。未指定時は -v から決定")
        )
        .arg(
            Arg::new("log-output")
                .long("log-output")
                .value_name("TARGET")
                .default_value("console")
                .value_parser(|s: &str| s.parse::<LogOutput>())
                .help("ログ出力先 (console, file, both)")
        )
        .arg(
            Arg::new("log-dir")
                .long("log-dir")
                .value_name("DIR")
                .default_value("logs")
                .help("ログファイルの出力ディレクトリ")
        )
        .get_matches();

    let verbose_level = matches.get_count("verbose");

    let log_config = LogConfig {
        level: matches
            .get_one::<String>("log-level")
            .map(|s| logging::parse_log_level(s))
            .unwrap_or_else(|| logging::level_for_verbosity(verbose_level)),
        output: matches.get_one::<LogOutput>("log-output").copied().unwrap_or(LogOutput::Console),
        log_dir: matches.get_one::<String>("log-dir").cloned().unwrap_or_else(|| "logs".to_string()),
        ..LogConfig::default()
    };

    // ガードはmain終了まで保持
    let _log_guard = match logging::init_logging(&log_config) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("エラー: ログ初期化に失敗しました: {}", e);
            std::process::exit(1);
        }
    };

    println!("宇宙戦闘シミュレーション (Space Combat Simulation) - shipsim v0.1.0");
    println!();

    let report_path = matches.get_one::<String>("report").map(String::as_str);

    let result = if matches.get_flag("test") {
        println!("=== デモシナリオ実行モード ===");
        ScenarioConfig::from_yaml_str(DEMO_SCENARIO)
            .map_err(|e| Box::new(e) as Box<dyn std::error::Error>)
            .and_then(|scenario| execute_scenario(scenario, verbose_level, report_path))
    } else if let Some(scenario_path) = matches.get_one::<String>("scenario") {
        run_scenario(scenario_path, matches.get_flag("info"), verbose_level, report_path)
    } else {
        show_default_help();
        Ok(())
    };

    if let Err(e) = result {
        eprintln!("エラー: {}", e);
        std::process::exit(1);
    }
}

/// シナリオファイルを読み込んで実行
fn run_scenario(
    scenario_path: &str,
    info_only: bool,
    verbose_level: u8,
    report_path: Option<&str>,
) -> Result<(), Box<dyn std::error::Error>> {
    let scenario = ScenarioConfig::from_file(scenario_path)?;
    info!("シナリオファイル読み込み完了: {}", scenario_path);

    if info_only {
        scenario.print_summary();
        return Ok(());
    }

    execute_scenario(scenario, verbose_level, report_path)
}

/// シナリオの実行
fn execute_scenario(
    scenario: ScenarioConfig,
    verbose_level: u8,
    report_path: Option<&str>,
) -> Result<(), Box<dyn std::error::Error>> {
    scenario.print_summary();
    println!();

    let mut simulation = SimulationEngine::new(scenario, verbose_level);
    simulation.initialize()?;
    simulation.run()?;

    let report = simulation.report();
    println!();
    report.print_summary();

    if let Some(path) = report_path {
        write_report(&report, path)?;
        println!("レポートを書き出しました: {}", path);
    }

    Ok(())
}

/// 結果レポートをYAMLで書き出し
fn write_report(report: &SimulationReport, path: &str) -> Result<(), Box<dyn std::error::Error>> {
    let yaml = serde_yaml::to_string(report)?;
    fs::write(path, yaml)?;
    Ok(())
}

/// デフォルトヘルプとシナリオ一覧を表示
fn show_default_help() {
    println!("使用方法:");
    println!("  shipsim [オプション]");
    println!();
    println!("オプション:");
    println!("  -s, --scenario <FILE>   シナリオファイルを指定して実行");
    println!("  -i, --info              シナリオ情報のみ表示");
    println!("  -t, --test              組み込みデモシナリオを実行");
    println!("  -r, --report <FILE>     結果レポートをYAMLで書き出し");
    println!("  -v, --verbose           詳細出力 (複数指定で詳細レベル上昇)");
    println!("      --log-output <T>    ログ出力先 (console, file, both)");
    println!("  -h, --help              このヘルプを表示");
    println!();
    println!("利用可能なシナリオファイル:");
    println!("  scenarios/demo_duel.yaml       - プレイヤー対追尾AIの1対1");
    println!("  scenarios/stop_in_place.yaml   - 停止AIのみの動作確認用");
    println!("  scenarios/fleet_battle.yaml    - 複数勢力の艦隊戦");
    println!();
    println!("例:");
    println!("  shipsim -s scenarios/fleet_battle.yaml -v");
    println!("  shipsim -s scenarios/fleet_battle.yaml -r report.yaml");
    println!("  shipsim -s scenarios/stop_in_place.yaml -i");
    println!("  shipsim --test");
}
