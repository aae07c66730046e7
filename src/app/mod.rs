use std::collections::VecDeque;
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::thread;
use std::time::Duration;

use eframe::egui::{self, Align, Context, Layout, Vec2};
use tracing::{info, warn};

use uwb_layout::feed::{LiveNetwork, Scenario};
use uwb_layout::{GraphEvent, Measurement, Simulation};

use crate::util::format_age;

mod controls;
mod render_utils;
mod view;

const EVENT_LOG_CAPACITY: usize = 200;
const FPS_SAMPLE_WINDOW: usize = 180;

#[derive(Clone, Copy, Debug)]
pub enum FeedSource {
    Live { seed: Option<u64> },
    Scenario(Scenario),
}

impl FeedSource {
    fn label(self) -> String {
        match self {
            Self::Live { .. } => "simulated network".to_owned(),
            Self::Scenario(scenario) => format!("scenario {scenario}"),
        }
    }
}

pub struct LayoutApp {
    simulation: Simulation,
    feed_source: FeedSource,
    feed_rate_hz: f32,
    feed_rx: Option<Receiver<Vec<Measurement>>>,
    events_rx: Receiver<GraphEvent>,
    event_log: VecDeque<String>,
    pan: Vec2,
    zoom: f32,
    paused: bool,
    search: String,
    selected: Option<String>,
    show_quadtree_overlay: bool,
    show_distance_labels: bool,
    show_removed: bool,
    last_batch_rejected: usize,
    fps_current: f32,
    fps_samples: VecDeque<f32>,
}

impl LayoutApp {
    pub fn new(
        _cc: &eframe::CreationContext<'_>,
        mut simulation: Simulation,
        feed_source: FeedSource,
        feed_rate_hz: f32,
    ) -> Self {
        let events_rx = simulation.subscribe();
        Self {
            feed_rx: Some(Self::spawn_feed(feed_source, feed_rate_hz)),
            simulation,
            feed_source,
            feed_rate_hz,
            events_rx,
            event_log: VecDeque::new(),
            pan: Vec2::ZERO,
            zoom: 1.0,
            paused: false,
            search: String::new(),
            selected: None,
            show_quadtree_overlay: false,
            show_distance_labels: true,
            show_removed: true,
            last_batch_rejected: 0,
            fps_current: 0.0,
            fps_samples: VecDeque::new(),
        }
    }

    /// Produces measurement batches on a background thread until the
    /// receiving side is dropped.
    fn spawn_feed(source: FeedSource, rate_hz: f32) -> Receiver<Vec<Measurement>> {
        let (tx, rx) = mpsc::channel();
        let interval = Duration::from_secs_f32(1.0 / rate_hz.clamp(0.1, 120.0));
        info!(source = %source.label(), rate_hz, "starting measurement feed");

        thread::spawn(move || {
            let mut network = match source {
                FeedSource::Live { seed } => Some(LiveNetwork::new(seed)),
                FeedSource::Scenario(_) => None,
            };
            loop {
                let batch = match (&mut network, source) {
                    (Some(network), _) => network.next_batch(),
                    (None, FeedSource::Scenario(scenario)) => scenario.measurements(),
                    (None, FeedSource::Live { .. }) => break,
                };
                if tx.send(batch).is_err() {
                    break;
                }
                thread::sleep(interval);
            }
        });

        rx
    }

    fn restart_feed(&mut self) {
        self.feed_rx = Some(Self::spawn_feed(self.feed_source, self.feed_rate_hz));
    }

    fn stop_feed(&mut self) {
        self.feed_rx = None;
    }

    fn drain_feed(&mut self) {
        let Some(rx) = self.feed_rx.take() else {
            return;
        };

        loop {
            match rx.try_recv() {
                Ok(batch) => {
                    let now = self.simulation.now_ms();
                    self.last_batch_rejected = self
                        .simulation
                        .submit_batch(&batch, now)
                        .iter()
                        .filter(|result| result.is_err())
                        .count();
                }
                Err(TryRecvError::Empty) => {
                    self.feed_rx = Some(rx);
                    return;
                }
                Err(TryRecvError::Disconnected) => {
                    warn!("measurement feed disconnected");
                    return;
                }
            }
        }
    }

    fn drain_events(&mut self) {
        let now = self.simulation.now_ms();
        for event in self.events_rx.try_iter() {
            self.event_log
                .push_front(format!("[{}] {}", format_age(now), describe_event(&event)));
        }
        self.event_log.truncate(EVENT_LOG_CAPACITY);
    }

    fn update_fps_counter(&mut self, ctx: &Context) {
        let dt = ctx.input(|input| input.stable_dt);
        if dt <= f32::EPSILON {
            return;
        }

        self.fps_current = (1.0 / dt).clamp(0.0, 1000.0);
        self.fps_samples.push_back(self.fps_current);
        while self.fps_samples.len() > FPS_SAMPLE_WINDOW {
            self.fps_samples.pop_front();
        }
    }

    fn fps_display_text(&self) -> String {
        let mut text = format!("FPS {:.0}", self.fps_current);
        if !self.fps_samples.is_empty() {
            let avg = self.fps_samples.iter().sum::<f32>() / self.fps_samples.len() as f32;
            text.push_str(&format!(" | avg {avg:.1}"));
        }
        text
    }
}

fn describe_event(event: &GraphEvent) -> String {
    match event {
        GraphEvent::NodeCreated { id, kind } => format!("+ node {id} ({})", kind.label()),
        GraphEvent::NodeRestored { id } => format!("node {id} restored"),
        GraphEvent::NodeStale { id } => format!("node {id} stale"),
        GraphEvent::NodeRemoved { id } => format!("node {id} removed"),
        GraphEvent::NodePurged { id } => format!("- node {id}"),
        GraphEvent::ConnectionCreated { key } => format!("+ edge {key}"),
        GraphEvent::ConnectionRestored { key } => format!("edge {key} restored"),
        GraphEvent::ConnectionStale { key } => format!("edge {key} stale"),
        GraphEvent::ConnectionRemoved { key } => format!("edge {key} removed"),
        GraphEvent::ConnectionPurged { key } => format!("- edge {key}"),
    }
}

impl eframe::App for LayoutApp {
    fn update(&mut self, ctx: &Context, _frame: &mut eframe::Frame) {
        self.update_fps_counter(ctx);
        self.drain_feed();

        egui::TopBottomPanel::top("top_bar")
            .resizable(false)
            .show(ctx, |ui| {
                ui.horizontal(|ui| {
                    ui.heading("uwb-layout");
                    ui.separator();
                    ui.label(format!("feed: {}", self.feed_source.label()));
                    ui.label(format!("nodes: {}", self.simulation.graph().node_count()));
                    ui.label(format!("edges: {}", self.simulation.graph().connection_count()));
                    ui.label(format!("scale: {:.1} px/m", self.simulation.scale()));
                    if self.last_batch_rejected > 0 {
                        ui.label(format!("rejected in last batch: {}", self.last_batch_rejected));
                    }
                    ui.with_layout(Layout::right_to_left(Align::Center), |ui| {
                        ui.label(self.fps_display_text());
                    });
                });
            });

        egui::SidePanel::left("controls")
            .resizable(true)
            .default_width(330.0)
            .show(ctx, |ui| self.draw_controls(ui));

        egui::CentralPanel::default().show(ctx, |ui| self.draw_layout(ui));

        self.drain_events();
        ctx.request_repaint();
    }
}
