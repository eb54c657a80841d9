use anyhow::{Context, Result};
use clap::Parser;
use exam_slicer::cli::{Cli, Command, EngineArgs, SliceArgs};
use exam_slicer::report::{log_summary, write_summary_json, RunSummary};
use exam_slicer::{preflight, BatchScheduler};
use slicer_ocr::detect_tesseract_status;
use slicer_render::PdfiumRenderer;
use std::process::ExitCode;

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let result = match &cli.command {
        Command::Slice(args) => slice(args),
        Command::Check(args) => check(args),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn slice(args: &SliceArgs) -> Result<()> {
    let config = args.to_config()?;
    let settings = config.batch_settings()?;
    let toolchain = preflight(&config)?;

    log::info!(
        "[Batch] 切分 {} -> {}",
        settings.input_dir.display(),
        settings.output_dir.display()
    );

    let run = BatchScheduler::new(settings, toolchain.engines())
        .run()
        .context("batch run failed")?;

    let summary = RunSummary::from_run(&run);
    log_summary(&summary);

    if let Some(path) = &args.summary {
        write_summary_json(path, &summary)
            .with_context(|| format!("writing summary to {}", path.display()))?;
        log::info!("[Batch] 汇总已写入 {}", path.display());
    }

    Ok(())
}

fn check(args: &EngineArgs) -> Result<()> {
    let config = args.to_config()?;
    let mut ready = true;

    let status = detect_tesseract_status(&config.tesseract);
    if status.installed {
        println!(
            "tesseract: {} ({})",
            status.version.as_deref().unwrap_or("unknown"),
            status.binary_path.as_deref().unwrap_or("?")
        );
        println!("languages: {}", status.available_langs.join(", "));
        let missing: Vec<&str> = config
            .tesseract
            .lang_or_default()
            .split('+')
            .filter(|lang| !status.available_langs.iter().any(|l| l == lang))
            .collect();
        if !missing.is_empty() {
            println!("warning: language data missing for {}", missing.join(", "));
        }
    } else {
        ready = false;
        println!(
            "tesseract: not found ({})",
            status.error.as_deref().unwrap_or("unknown error")
        );
    }

    match PdfiumRenderer::bind(config.pdfium_dir.as_deref()) {
        Ok(_) => println!("pdfium: ok"),
        Err(e) => {
            ready = false;
            println!("pdfium: {}", e);
        }
    }

    anyhow::ensure!(ready, "required engines are missing");
    Ok(())
}
