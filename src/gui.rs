// src/gui.rs
use eframe::egui;
use egui::{Color32, RichText};
use std::sync::mpsc::{channel, Receiver};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use crate::config::ClientConfig;
use crate::drivers::{
    metric_fields, ConnectionSnapshot, ConnectionState, LinkStatus, RenderTick, ScopeFrame,
    ScopeRenderer, StreamDispatcher, ViewParameters,
};
use crate::engine;
use crate::recorder;
use crate::types::*;

const LOG_LINES: usize = 8;

pub struct ScopeApp {
    config: ClientConfig,
    // 数据与绘图
    dispatcher: StreamDispatcher,
    renderer: ScopeRenderer,
    tick: RenderTick,
    view: ViewParameters,
    texture: Option<egui::TextureHandle>,
    last_frame: Option<ScopeFrame>,
    // 连接状态
    connection: Option<ConnectionSnapshot>,
    clients: Option<u32>,
    // 界面日志
    log_messages: Vec<String>,
    // 通讯管道
    rx: Receiver<ClientEvent>,
    tx_cmd: mpsc::UnboundedSender<ClientCommand>,
    engine: Option<JoinHandle<()>>,
}

impl ScopeApp {
    pub fn new(cc: &eframe::CreationContext<'_>, config: ClientConfig) -> Self {
        cc.egui_ctx.set_visuals(egui::Visuals::dark());
        let (tx, rx) = channel();
        let (tx_cmd, rx_cmd) = mpsc::unbounded_channel();
        // 启动后台网络线程
        let engine = engine::spawn_thread(&config, tx, rx_cmd);
        tx_cmd.send(ClientCommand::Connect).ok();
        let mut dispatcher = StreamDispatcher::new(
            config.buffer.export_capacity,
            config.buffer.min_window_seconds,
            config.wire_scale,
        );
        dispatcher.start_viewing(Instant::now());
        Self {
            renderer: ScopeRenderer::new(config.scope_style()),
            tick: RenderTick::new(config.refresh_interval()),
            config,
            dispatcher,
            view: ViewParameters::default(),
            texture: None,
            last_frame: None,
            connection: None,
            clients: None,
            log_messages: vec!["BioScope ready.".to_owned()],
            rx,
            tx_cmd,
            engine: Some(engine),
        }
    }

    fn log(&mut self, msg: &str) {
        self.log_messages.push(format!("> {}", msg));
        if self.log_messages.len() > LOG_LINES {
            self.log_messages.remove(0);
        }
    }

    fn status(&self) -> LinkStatus {
        self.connection.map_or(LinkStatus::Offline, |s| s.status)
    }

    fn drain_events(&mut self) {
        while let Ok(event) = self.rx.try_recv() {
            match event {
                ClientEvent::Log(s) => self.log(&s),
                ClientEvent::Connection(snapshot) => {
                    if snapshot.state != ConnectionState::Connected {
                        self.clients = None;
                    }
                    self.connection = Some(snapshot);
                }
                ClientEvent::Message(message) => self.dispatcher.dispatch(message, &self.view),
                ClientEvent::Clients(n) => self.clients = Some(n),
            }
        }
    }

    fn repaint_scope(&mut self, ctx: &egui::Context, width: u32, height: u32) {
        let rendered = self.renderer.render(
            self.dispatcher.buffer(),
            self.dispatcher.descriptor(),
            &self.view,
            width,
            height,
        );
        match rendered {
            Ok(frame) => {
                let image = egui::ColorImage::from_rgb(
                    [frame.width as usize, frame.height as usize],
                    &frame.rgb,
                );
                match &mut self.texture {
                    Some(handle) => handle.set(image, egui::TextureOptions::LINEAR),
                    None => {
                        self.texture =
                            Some(ctx.load_texture("scope", image, egui::TextureOptions::LINEAR))
                    }
                }
                self.last_frame = Some(frame);
            }
            Err(err) => log::error!("render failed: {err}"),
        }
    }

    fn export_csv(&mut self) {
        match recorder::export_csv(self.dispatcher.buffer().export_log(), &self.config.export_dir) {
            Ok(path) => self.log(&format!("CSV saved: {}", path.display())),
            Err(err) => {
                log::error!("csv export failed: {err}");
                self.log(&format!("CSV export failed: {err}"));
            }
        }
    }

    fn export_png(&mut self) {
        let Some(frame) = &self.last_frame else {
            self.log("Nothing rendered yet.");
            return;
        };
        let signal = self.dispatcher.descriptor().kind.label();
        match recorder::save_png(frame, signal, &self.config.export_dir) {
            Ok(path) => self.log(&format!("PNG saved: {}", path.display())),
            Err(err) => {
                log::error!("png export failed: {err}");
                self.log(&format!("PNG export failed: {err}"));
            }
        }
    }

    fn side_panel(&mut self, ui: &mut egui::Ui) {
        ui.add_space(10.0);
        ui.heading("BioScope");
        ui.label("Live biosignal viewer");
        ui.separator();

        let status = self.status();
        let colour = match status {
            LinkStatus::Online => Color32::GREEN,
            LinkStatus::Reconnecting => Color32::from_rgb(255, 165, 0),
            LinkStatus::Connecting => Color32::YELLOW,
            LinkStatus::Offline => Color32::GRAY,
        };
        ui.label(RichText::new(status.label()).strong().color(colour));
        if let Some(snapshot) = self.connection {
            if snapshot.backoff_attempt > 0 {
                ui.label(RichText::new(format!("retry #{}", snapshot.backoff_attempt)).small());
            }
        }
        ui.label(format!(
            "Clients: {}",
            self.clients.map_or_else(|| "--".to_owned(), |n| n.to_string())
        ));

        let idle = self
            .connection
            .map_or(true, |s| s.state == ConnectionState::Disconnected);
        let btn_txt = if idle { "CONNECT" } else { "DISCONNECT" };
        if ui.button(btn_txt).clicked() {
            let cmd = if idle { ClientCommand::Connect } else { ClientCommand::Disconnect };
            self.tx_cmd.send(cmd).ok();
        }

        ui.separator();
        ui.label(format!(
            "Signal: {}",
            self.dispatcher.signal_label().unwrap_or("--")
        ));
        ui.label(format!(
            "Condition: {}",
            self.dispatcher.condition().unwrap_or("--")
        ));
        ui.label(format!(
            "Device: {}",
            self.dispatcher.device_state().unwrap_or("--")
        ));
        let stats = self.dispatcher.stats();
        ui.label(format!(
            "Points: {} ({} /s)",
            stats.total_points, stats.points_per_second
        ));
        ui.label(format!(
            "Viewing: {}s",
            stats.elapsed(Instant::now()).as_secs()
        ));

        ui.separator();
        ui.label("VIEW");
        ui.horizontal(|ui| {
            if ui.button("-").clicked() {
                self.view.zoom_out();
            }
            ui.label(format!("{}%", self.view.vertical_zoom_percent));
            if ui.button("+").clicked() {
                self.view.zoom_in();
            }
        });
        let mut hzoom = self.view.horizontal_zoom_percent;
        if ui
            .add(egui::Slider::new(&mut hzoom, 25..=400).text("time %"))
            .changed()
        {
            self.view.set_horizontal_zoom(hzoom);
            self.dispatcher.sync_view(&self.view);
        }
        ui.horizontal(|ui| {
            let pause_txt = if self.view.paused { "RESUME" } else { "PAUSE" };
            if ui.button(pause_txt).clicked() {
                self.view.toggle_pause();
            }
            if ui.button("RESET VIEW").clicked() {
                self.view.reset_view();
                self.dispatcher.sync_view(&self.view);
            }
        });
        if ui.button("CLEAR DATA").clicked() {
            self.dispatcher.start_viewing(Instant::now());
            self.log("Buffer cleared.");
        }

        ui.separator();
        ui.label("EXPORT");
        ui.horizontal(|ui| {
            if ui.button("CSV").clicked() {
                self.export_csv();
            }
            if ui.button("PNG").clicked() {
                self.export_png();
            }
        });
        ui.label(
            RichText::new(format!(
                "{} samples logged",
                self.dispatcher.buffer().export_log().len()
            ))
            .small(),
        );

        ui.separator();
        ui.label("METRICS");
        let kind = self.dispatcher.descriptor().kind;
        let metrics = self.dispatcher.metrics();
        egui::Grid::new("metrics").num_columns(2).show(ui, |ui| {
            for field in metric_fields(kind) {
                let value = metrics
                    .and_then(|m| m.fields.get(field.key))
                    .map_or_else(|| "--".to_owned(), |v| v.format(field.decimals));
                ui.label(field.label);
                ui.monospace(value);
                ui.end_row();
            }
        });

        ui.add_space(10.0);
        egui::ScrollArea::vertical().max_height(120.0).show(ui, |ui| {
            for m in &self.log_messages {
                ui.monospace(m);
            }
        });
    }

    fn scope_panel(&mut self, ui: &mut egui::Ui) {
        let descriptor = self.dispatcher.descriptor();
        let labels = descriptor.axis_labels();
        ui.horizontal(|ui| {
            ui.label(RichText::new(descriptor.kind.label()).strong());
            ui.label(format!(
                "{} | {} | {} {}",
                labels.y_max, labels.y_mid, labels.y_min, descriptor.unit
            ));
            if self.view.paused {
                ui.label(RichText::new("PAUSED").color(Color32::YELLOW));
            }
        });
        let caption = descriptor.scale_caption(self.renderer.style().grid_x);

        let area = ui.available_size() - egui::vec2(0.0, 24.0);
        let width = area.x.max(1.0).round() as u32;
        let height = area.y.max(1.0).round() as u32;
        let size_changed = self
            .last_frame
            .as_ref()
            .map_or(true, |f| f.width != width || f.height != height);
        if self.tick.tick(Instant::now()) || size_changed {
            self.repaint_scope(ui.ctx(), width, height);
        }

        if let Some(texture) = &self.texture {
            let size = egui::vec2(width as f32, height as f32);
            let response =
                ui.add(egui::Image::new((texture.id(), size)).sense(egui::Sense::drag()));
            if response.dragged() {
                self.view.pan_by_pixels(response.drag_delta().y, size.y);
            }
            if response.hovered() {
                let scroll = ui.ctx().input(|i| i.scroll_delta.y);
                self.view.apply_wheel(scroll);
            }
        }

        ui.horizontal(|ui| {
            ui.label(RichText::new(caption).small());
            ui.label(
                RichText::new(format!("0s | {} | {}", labels.x_mid, labels.x_max)).small(),
            );
        });
    }
}

impl eframe::App for ScopeApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.drain_events();
        self.dispatcher.stats_mut().roll(Instant::now());

        egui::SidePanel::left("L").min_width(260.0).show(ctx, |ui| {
            self.side_panel(ui);
        });
        egui::CentralPanel::default().show(ctx, |ui| {
            self.scope_panel(ui);
        });

        let wait = self.tick.remaining(Instant::now());
        ctx.request_repaint_after(wait.max(Duration::from_millis(1)));
    }
}

impl Drop for ScopeApp {
    fn drop(&mut self) {
        self.tick.cancel();
        self.tx_cmd.send(ClientCommand::Shutdown).ok();
        if let Some(engine) = self.engine.take() {
            if engine.join().is_err() {
                log::error!("network thread panicked");
            }
        }
    }
}
