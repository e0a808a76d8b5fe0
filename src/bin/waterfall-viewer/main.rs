use std::sync::Arc;

use dark_light::Mode;
use eframe::egui;
use log::LevelFilter;
use parking_lot::RwLock;
use simple_logger::SimpleLogger;

use trace_waterfall::fov;
use trace_waterfall::themes::waterfall_visuals;
use trace_waterfall::widgets::{Waterfall, WaterfallState};
use trace_waterfall::{NodeId, SpanRecord, TraceTree, ViewManagerConfig};

const OPS: &[&str] = &["http.server", "db.query", "cache.get", "template.render", "rpc.call"];

/// A deterministic trace: a root request fanning out into nested calls.
fn synthetic_trace() -> TraceTree {
    let mut spans = vec![SpanRecord {
        id: NodeId(1),
        op: OPS[0].to_owned(),
        description: "GET /checkout".to_owned(),
        start_ms: 0.0,
        duration_ms: 1_800.0,
        ..Default::default()
    }];

    let mut next_id = 2;
    let mut start = 12.0;
    for i in 0..60u64 {
        let op = OPS[1 + (i as usize % (OPS.len() - 1))];
        let duration = 4.0 + ((i * 37) % 90) as f64;
        let parent = NodeId(next_id);
        spans.push(SpanRecord {
            id: parent,
            parent: Some(NodeId(1)),
            op: op.to_owned(),
            description: format!("step {i}"),
            start_ms: start,
            duration_ms: duration,
            errors: if i % 17 == 5 { vec![start + duration / 2.0] } else { Vec::new() },
            performance_issues: if i % 23 == 11 { vec![start + 1.0] } else { Vec::new() },
        });
        next_id += 1;
        for j in 0..(i % 4) {
            spans.push(SpanRecord {
                id: NodeId(next_id),
                parent: Some(parent),
                op: OPS[(i + j) as usize % OPS.len()].to_owned(),
                description: format!("step {i}.{j}"),
                start_ms: start + 1.0 + j as f64 * duration / 4.0,
                duration_ms: duration / 5.0,
                ..Default::default()
            });
            next_id += 1;
        }
        start += duration * 0.3;
    }
    TraceTree::from_spans(spans)
}

#[cfg(feature = "serde")]
fn load_trace(path: Option<&str>) -> TraceTree {
    let Some(path) = path else {
        return synthetic_trace();
    };
    match std::fs::read_to_string(path)
        .map_err(|err| err.to_string())
        .and_then(|json| TraceTree::from_json(&json).map_err(|err| err.to_string()))
    {
        Ok(tree) => {
            log::info!("loaded {} spans from {path}", tree.len());
            tree
        }
        Err(err) => {
            log::error!("failed to load {path}: {err}; showing a synthetic trace");
            synthetic_trace()
        }
    }
}

#[cfg(not(feature = "serde"))]
fn load_trace(path: Option<&str>) -> TraceTree {
    if let Some(path) = path {
        log::warn!("loading {path} requires the `serde` feature; showing a synthetic trace");
    }
    synthetic_trace()
}

struct WaterfallApp {
    tree: TraceTree,
    state: Arc<RwLock<WaterfallState>>,
    query: String,
}

impl eframe::App for WaterfallApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        let now_ms = ctx.input(|i| i.time) * 1000.0;
        let mut state = self.state.write();

        if let Some(fov) = state.manager.take_field_of_view_change() {
            self.query = fov::write_query(&self.query, &fov);
            log::info!("field of view: ?{}", self.query);
        }

        egui::TopBottomPanel::top("toolbar").show(ctx, |ui| {
            ui.horizontal(|ui| {
                ui.label(format!("{} rows", self.tree.len()));
                if ui.button("Reset zoom").clicked() {
                    state.manager.reset_zoom(now_ms);
                }
                ui.separator();
                ui.monospace(format!("?{}", self.query));
            });
        });

        egui::CentralPanel::default().show(ctx, |ui| {
            ui.add(Waterfall::new(&mut self.tree, &mut state));
        });
    }
}

fn main() -> eframe::Result {
    if let Err(err) = SimpleLogger::new().with_level(LevelFilter::Info).init() {
        eprintln!("logger already installed: {err}");
    }

    let mut path = None;
    let mut query = String::new();
    for arg in std::env::args().skip(1) {
        match arg.strip_prefix("--fov=") {
            Some(value) => query = format!("{}={value}", fov::FOV_QUERY_KEY),
            None => path = Some(arg),
        }
    }

    let tree = load_trace(path.as_deref());
    let mut state = WaterfallState::new(ViewManagerConfig::default(), &tree);
    if let Err(err) = state.manager.maybe_initialize_trace_view_from_qs(&query) {
        log::warn!("starting with the full trace: {err}");
    }

    let mut native_options = eframe::NativeOptions::default();
    native_options.persist_window = true;

    eframe::run_native(
        "Trace waterfall",
        native_options,
        Box::new(move |cc| {
            let ctx = cc.egui_ctx.clone();
            if let Err(err) =
                ctrlc::set_handler(move || ctx.send_viewport_cmd(egui::ViewportCommand::Close))
            {
                log::warn!("failed to set exit signal handler: {err}");
            }

            cc.egui_ctx
                .set_visuals_of(egui::Theme::Light, waterfall_visuals(false));
            cc.egui_ctx
                .set_visuals_of(egui::Theme::Dark, waterfall_visuals(true));
            let theme = match dark_light::detect() {
                Ok(Mode::Light) => egui::ThemePreference::Light,
                Ok(Mode::Dark) => egui::ThemePreference::Dark,
                Ok(Mode::Unspecified) | Err(_) => egui::ThemePreference::Dark,
            };
            cc.egui_ctx.set_theme(theme);

            Ok(Box::new(WaterfallApp {
                tree,
                state: Arc::new(RwLock::new(state)),
                query,
            }))
        }),
    )
}
