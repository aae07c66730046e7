use eframe::egui::{
    self, Align2, Color32, FontId, Pos2, Rect, Sense, Shape, Stroke, Ui, Vec2, pos2, vec2,
};

use uwb_layout::EntityState;
use uwb_layout::config::CanvasSize;
use uwb_layout::physics::quadtree_cells;

use crate::util::format_meters;

use super::LayoutApp;
use super::render_utils::{
    blend_color, circle_visible, dim_color, draw_background, edge_color, edge_visible,
    kind_color, node_radius, screen_to_world, state_fade, world_to_screen,
};

/// egui's `stable_dt` is in seconds, the solver counts frames.
const FRAMES_PER_SECOND: f32 = 60.0;

struct ScreenNode {
    index: usize,
    position: Pos2,
    radius: f32,
}

impl LayoutApp {
    pub(super) fn draw_layout(&mut self, ui: &mut Ui) {
        let (rect, response) = ui.allocate_exact_size(ui.available_size(), Sense::click_and_drag());
        self.handle_zoom(ui, rect, &response);
        self.handle_pan(&response);

        self.simulation.set_canvas(CanvasSize {
            width: rect.width(),
            height: rect.height(),
        });
        if !self.paused {
            let dt = ui.input(|input| input.stable_dt) * FRAMES_PER_SECOND;
            self.simulation.tick(Some(dt));
        }

        let painter = ui.painter_at(rect);
        let (pan, zoom) = (self.pan, self.zoom);
        draw_background(&painter, rect, pan, zoom);

        let canvas_center = vec2(rect.width(), rect.height()) * 0.5;
        let to_screen = |position: Vec2| world_to_screen(rect, pan, zoom, position - canvas_center);

        if self.show_quadtree_overlay {
            for cell in quadtree_cells(self.simulation.graph()) {
                let alpha = (140.0 - cell.depth as f32 * 12.0).clamp(30.0, 140.0) as u8;
                let stroke = Stroke::new(1.0, Color32::from_rgba_unmultiplied(106, 198, 255, alpha));
                let half = Vec2::splat(cell.half_extent);
                let top_left = to_screen(cell.center - half);
                let bottom_right = to_screen(cell.center + half);
                let top_right = pos2(bottom_right.x, top_left.y);
                let bottom_left = pos2(top_left.x, bottom_right.y);
                painter.line_segment([top_left, top_right], stroke);
                painter.line_segment([top_right, bottom_right], stroke);
                painter.line_segment([bottom_right, bottom_left], stroke);
                painter.line_segment([bottom_left, top_left], stroke);
            }
        }

        let graph = self.simulation.graph();
        let matches = self.search_matches();
        let radius_scale = zoom.sqrt().clamp(0.5, 2.0);
        let screen_nodes = graph
            .nodes()
            .iter()
            .enumerate()
            .filter(|(_, node)| node.has_initial_position)
            .filter(|(_, node)| self.show_removed || node.state != EntityState::Removed)
            .map(|(index, node)| ScreenNode {
                index,
                position: to_screen(node.position),
                radius: node_radius(node.kind) * radius_scale,
            })
            .filter(|screen| circle_visible(rect, screen.position, screen.radius))
            .collect::<Vec<_>>();

        let selected = self.selected.as_deref();
        let highlight = Color32::from_rgb(255, 235, 140);
        for connection in graph.connections() {
            if !self.show_removed && connection.state == EntityState::Removed {
                continue;
            }
            let (Some(a), Some(b)) = (graph.node(connection.key.a()), graph.node(connection.key.b()))
            else {
                continue;
            };
            if !a.has_initial_position || !b.has_initial_position {
                continue;
            }

            let start = to_screen(a.position);
            let end = to_screen(b.position);
            if !edge_visible(rect, start, end, 2.0) {
                continue;
            }

            let touches_selection =
                selected.is_some_and(|id| id == connection.key.a() || id == connection.key.b());
            let mut color = edge_color(connection.accuracy, connection.state);
            if touches_selection {
                color = blend_color(color, highlight, 0.6);
            }
            let stroke = Stroke::new(if touches_selection { 2.2 } else { 1.4 }, color);

            if connection.accuracy.is_approximate() {
                painter.extend(Shape::dashed_line(&[start, end], stroke, 6.0, 4.0));
            } else {
                painter.line_segment([start, end], stroke);
            }

            if self.show_distance_labels && zoom > 0.45 {
                let prefix = if connection.accuracy.is_approximate() { "~" } else { "" };
                painter.text(
                    start + (end - start) * 0.5,
                    Align2::CENTER_BOTTOM,
                    format!("{prefix}{}", format_meters(connection.distance_m)),
                    FontId::proportional(11.0),
                    dim_color(Color32::from_rgb(205, 212, 222), state_fade(connection.state)),
                );
            }
        }

        for screen in &screen_nodes {
            let node = &graph.nodes()[screen.index];
            let fade = state_fade(node.state);
            painter.circle_filled(screen.position, screen.radius, dim_color(kind_color(node.kind), fade));

            let is_selected = selected == Some(node.id.as_str());
            if is_selected || matches.contains(&node.id) {
                painter.circle_stroke(
                    screen.position,
                    screen.radius + 3.0,
                    Stroke::new(if is_selected { 2.5 } else { 1.5 }, highlight),
                );
            }

            painter.text(
                screen.position + vec2(0.0, screen.radius + 2.0),
                Align2::CENTER_TOP,
                node.id.as_str(),
                FontId::proportional(12.0),
                dim_color(Color32::from_rgb(230, 232, 236), fade),
            );
        }

        let hovered = Self::hovered_node(ui, &screen_nodes)
            .map(|index| graph.nodes()[index].id.clone());
        if hovered.is_some() {
            ui.output_mut(|output| {
                output.cursor_icon = egui::CursorIcon::PointingHand;
            });
        }

        if response.clicked_by(egui::PointerButton::Primary) {
            self.selected = hovered;
        }
    }

    fn handle_zoom(&mut self, ui: &Ui, rect: Rect, response: &egui::Response) {
        if !response.hovered() {
            return;
        }

        let scroll = ui.input(|input| input.raw_scroll_delta.y);
        if scroll.abs() <= f32::EPSILON {
            return;
        }

        let pointer = ui
            .input(|input| input.pointer.hover_pos())
            .unwrap_or_else(|| rect.center());
        let world_before = screen_to_world(rect, self.pan, self.zoom, pointer);

        let zoom_factor = (1.0 + (scroll * 0.0018)).clamp(0.85, 1.15);
        self.zoom = (self.zoom * zoom_factor).clamp(0.1, 8.0);
        self.pan = pointer - rect.center() - (world_before * self.zoom);
    }

    fn handle_pan(&mut self, response: &egui::Response) {
        if response.dragged_by(egui::PointerButton::Secondary)
            || response.dragged_by(egui::PointerButton::Middle)
        {
            self.pan += response.drag_delta();
        }
    }

    fn hovered_node(ui: &Ui, screen_nodes: &[ScreenNode]) -> Option<usize> {
        let pointer = ui.input(|input| input.pointer.hover_pos())?;
        screen_nodes
            .iter()
            .filter_map(|screen| {
                let distance = screen.position.distance(pointer);
                (distance <= screen.radius).then_some((screen.index, distance))
            })
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(index, _)| index)
    }
}
