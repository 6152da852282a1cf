// src/main.rs
#![cfg_attr(not(debug_assertions), windows_subsystem = "windows")]
mod config;
mod drivers;
mod engine;
mod gui;
mod recorder;
mod types;
use anyhow::Context;
use eframe::egui;
use config::ClientConfig;
// 入口函数
fn main() -> anyhow::Result<()> {
    env_logger::init();
    let config = ClientConfig::load()?;
    log::info!("streaming from {}", config.url);
    let viewport = egui::ViewportBuilder::default()
        .with_inner_size([1280.0, 800.0])
        .with_min_inner_size([900.0, 600.0])
        .with_title("BioScope");
    let options = eframe::NativeOptions {
        viewport,
        ..Default::default()
    };
    eframe::run_native(
        "BioScope",
        options,
        Box::new(move |cc| Box::new(gui::ScopeApp::new(cc, config))),
    )
    .map_err(|err| anyhow::anyhow!("{err}"))
    .context("viewer window failed")
}
