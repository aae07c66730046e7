use eframe::egui::{self, Ui};
use fuzzy_matcher::FuzzyMatcher;
use fuzzy_matcher::skim::SkimMatcherV2;

use crate::util::{format_age, format_meters};

use super::LayoutApp;

const MAX_SEARCH_RESULTS: usize = 12;

fn fuzzy_match_score(matcher: &SkimMatcherV2, text: &str, query: &str) -> Option<i64> {
    matcher
        .fuzzy_match(text, query)
        .or_else(|| matcher.fuzzy_match(&text.to_ascii_lowercase(), &query.to_ascii_lowercase()))
}

impl LayoutApp {
    /// Node ids matching the search box, best match first.
    pub(super) fn search_matches(&self) -> Vec<String> {
        let query = self.search.trim();
        if query.is_empty() {
            return Vec::new();
        }

        let matcher = SkimMatcherV2::default();
        let mut scored = self
            .simulation
            .graph()
            .nodes()
            .iter()
            .filter_map(|node| {
                fuzzy_match_score(&matcher, &node.id, query).map(|score| (score, node.id.clone()))
            })
            .collect::<Vec<_>>();
        scored.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| a.1.cmp(&b.1)));
        scored.into_iter().map(|(_, id)| id).collect()
    }

    pub(super) fn draw_controls(&mut self, ui: &mut Ui) {
        egui::ScrollArea::vertical().show(ui, |ui| {
            self.draw_search(ui);
            ui.separator();
            self.draw_feed_controls(ui);
            ui.separator();
            self.draw_tuning(ui);
            ui.separator();
            self.draw_selection(ui);
            ui.separator();
            self.draw_diagnostics(ui);
            ui.separator();
            self.draw_event_log(ui);
        });
    }

    fn draw_search(&mut self, ui: &mut Ui) {
        ui.label("Search nodes");
        ui.text_edit_singleline(&mut self.search);

        let matches = self.search_matches();
        for id in matches.iter().take(MAX_SEARCH_RESULTS) {
            let is_selected = self.selected.as_deref() == Some(id.as_str());
            if ui.selectable_label(is_selected, id.as_str()).clicked() {
                self.selected = Some(id.clone());
            }
        }
        if matches.len() > MAX_SEARCH_RESULTS {
            ui.weak(format!("{} more", matches.len() - MAX_SEARCH_RESULTS));
        }
    }

    fn draw_feed_controls(&mut self, ui: &mut Ui) {
        ui.checkbox(&mut self.paused, "Pause simulation");
        ui.horizontal(|ui| {
            if self.feed_rx.is_some() {
                if ui.button("Stop feed").clicked() {
                    self.stop_feed();
                }
            } else if ui.button("Start feed").clicked() {
                self.restart_feed();
            }
            if ui.button("Reset view").clicked() {
                self.pan = egui::Vec2::ZERO;
                self.zoom = 1.0;
            }
        });
        let rate_changed = ui
            .add(egui::Slider::new(&mut self.feed_rate_hz, 0.5..=30.0).text("Feed rate (Hz)"))
            .drag_stopped();
        if rate_changed && self.feed_rx.is_some() {
            self.restart_feed();
        }
        ui.checkbox(&mut self.show_distance_labels, "Distance labels");
        ui.checkbox(&mut self.show_removed, "Show removed nodes");
        ui.checkbox(&mut self.show_quadtree_overlay, "Show quadtree overlay");
    }

    fn draw_tuning(&mut self, ui: &mut Ui) {
        let mut scale = self.simulation.scale();
        let config = self.simulation.config_mut();

        ui.collapsing("Physics", |ui| {
            let physics = &mut config.physics;
            ui.add(egui::Slider::new(&mut physics.spring_constant, 0.005..=0.3).text("Spring constant"));
            ui.add(egui::Slider::new(&mut physics.damping, 0.5..=0.99).text("Damping"));
            ui.add(egui::Slider::new(&mut physics.mass, 0.1..=10.0).text("Mass"));
            ui.add(
                egui::Slider::new(&mut physics.repulsion_strength, 0.0..=6000.0)
                    .text("Repulsion strength"),
            );
            ui.add(egui::Slider::new(&mut physics.min_distance, 0.0..=120.0).text("Repulsion range (px)"));
            ui.add(egui::Slider::new(&mut physics.boundary_force, 0.0..=0.3).text("Boundary force"));
            ui.add(
                egui::Slider::new(&mut physics.centering_coefficient, 0.0..=0.005)
                    .logarithmic(true)
                    .text("Centering"),
            );
            ui.add(egui::Slider::new(&mut physics.max_force, 1.0..=500.0).text("Force limit"));
            ui.add(egui::Slider::new(&mut physics.max_speed, 1.0..=200.0).text("Speed limit"));
        });

        ui.collapsing("Scale", |ui| {
            let scale_config = &mut config.scale;
            ui.checkbox(&mut scale_config.auto_scale_enabled, "Auto scale");
            ui.add(
                egui::Slider::new(&mut scale, scale_config.scale_min..=scale_config.scale_max)
                    .text("Pixels per meter"),
            );
            ui.add(
                egui::Slider::new(&mut scale_config.target_usage_fraction, 0.2..=0.95)
                    .text("Target usage"),
            );
            ui.add(egui::Slider::new(&mut scale_config.dead_band, 0.0..=0.5).text("Dead band"));
            ui.add(egui::Slider::new(&mut scale_config.adjustment_rate, 0.0..=0.2).text("Adjustment rate"));
        });

        ui.collapsing("Lifecycle", |ui| {
            let lifecycle = &mut config.lifecycle;
            ui.add(
                egui::Slider::new(&mut lifecycle.stale_timeout_ms, 1_000..=120_000)
                    .text("Stale after (ms)"),
            );
            ui.add(
                egui::Slider::new(&mut lifecycle.removal_timeout_ms, 1_000..=120_000)
                    .text("Removed after stale (ms)"),
            );
        });

        if (scale - self.simulation.scale()).abs() > f32::EPSILON {
            self.simulation.set_scale(scale);
        }
    }

    fn draw_selection(&mut self, ui: &mut Ui) {
        let Some(id) = self.selected.clone() else {
            ui.weak("Click a node to inspect it");
            return;
        };
        let graph = self.simulation.graph();
        let Some(node) = graph.node(&id) else {
            self.selected = None;
            return;
        };

        let now = self.simulation.now_ms();
        ui.heading(id.as_str());
        ui.label(format!("kind: {}", node.kind.label()));
        ui.label(format!("state: {:?}", node.state));
        ui.label(format!("last update: {} ago", format_age(now.saturating_sub(node.last_update))));
        if let Some(geo) = node.geo {
            ui.label(format!("geo: {:.6}, {:.6}", geo.lat, geo.lng));
        }

        ui.label("Connections (measured / layout):");
        for connection in graph.connections() {
            let other = if connection.key.a() == id {
                connection.key.b()
            } else if connection.key.b() == id {
                connection.key.a()
            } else {
                continue;
            };
            let layout = self
                .simulation
                .layout_distance_m(&id, other)
                .map_or_else(|| "-".to_owned(), format_meters);
            ui.label(format!(
                "{other}: {} / {layout} ({:?}, {:?})",
                format_meters(connection.distance_m),
                connection.accuracy,
                connection.state,
            ));
        }
    }

    fn draw_diagnostics(&self, ui: &mut Ui) {
        let diagnostics = self.simulation.diagnostics();
        ui.collapsing("Diagnostics", |ui| {
            ui.label(format!("ticks: {}", diagnostics.tick_count));
            ui.label(format!("kinetic energy: {:.3}", diagnostics.kinetic_energy));
            ui.label(format!(
                "nodes: {} active / {} stale / {} removed",
                diagnostics.nodes.active, diagnostics.nodes.stale, diagnostics.nodes.removed
            ));
            ui.label(format!("rejected measurements: {}", diagnostics.rejected_measurements));
            ui.label(format!("caught panics: {}", diagnostics.caught_panics));
            for inconsistency in &diagnostics.inconsistencies {
                let [a, b, c] = &inconsistency.nodes;
                let [ab, bc, ca] = inconsistency.distances_m;
                ui.label(format!("impossible triangle {a}-{b}-{c}: {ab} / {bc} / {ca} m"));
            }
        });
    }

    fn draw_event_log(&self, ui: &mut Ui) {
        ui.collapsing("Events", |ui| {
            for line in &self.event_log {
                ui.monospace(line.as_str());
            }
        });
    }
}
