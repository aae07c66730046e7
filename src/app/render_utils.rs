use eframe::egui::{Color32, Painter, Pos2, Rect, Stroke, Vec2};

use uwb_layout::EntityState;
use uwb_layout::NodeKind;
use uwb_layout::graph::AccuracyClass;

fn lerp_channel(from: u8, to: u8, amount: f32) -> u8 {
    (from as f32 + (to as f32 - from as f32) * amount).round() as u8
}

/// Linear mix in unmultiplied space; `amount` 0 keeps `base`, 1 gives `overlay`.
pub(super) fn blend_color(base: Color32, overlay: Color32, amount: f32) -> Color32 {
    let amount = amount.clamp(0.0, 1.0);
    let [r, g, b, a] = base.to_srgba_unmultiplied();
    let [or, og, ob, oa] = overlay.to_srgba_unmultiplied();
    Color32::from_rgba_unmultiplied(
        lerp_channel(r, or, amount),
        lerp_channel(g, og, amount),
        lerp_channel(b, ob, amount),
        lerp_channel(a, oa, amount),
    )
}

/// Darkens toward black and drops alpha less steeply, so faded items stay legible.
pub(super) fn dim_color(color: Color32, brightness: f32) -> Color32 {
    let brightness = brightness.clamp(0.0, 1.0);
    let [r, g, b, a] = color.to_srgba_unmultiplied();
    let scale = |channel: u8| (channel as f32 * brightness) as u8;
    Color32::from_rgba_unmultiplied(
        scale(r),
        scale(g),
        scale(b),
        (a as f32 * (0.45 + brightness * 0.55)) as u8,
    )
}

/// Dark backdrop with a grid that follows pan and zoom.
pub(super) fn draw_background(painter: &Painter, rect: Rect, pan: Vec2, zoom: f32) {
    painter.rect_filled(rect, 0.0, Color32::from_rgb(17, 21, 27));

    let spacing = (50.0 * zoom.clamp(0.6, 1.8)).max(20.0);
    let anchor = rect.center() + pan;
    let stroke = Stroke::new(1.0, Color32::from_rgba_unmultiplied(58, 68, 80, 70));

    let first_x = rect.left() + (anchor.x - rect.left()).rem_euclid(spacing);
    let columns = ((rect.right() - first_x) / spacing).ceil().max(0.0) as usize;
    for column in 0..columns {
        let x = first_x + column as f32 * spacing;
        painter.vline(x, rect.y_range(), stroke);
    }

    let first_y = rect.top() + (anchor.y - rect.top()).rem_euclid(spacing);
    let rows = ((rect.bottom() - first_y) / spacing).ceil().max(0.0) as usize;
    for row in 0..rows {
        let y = first_y + row as f32 * spacing;
        painter.hline(rect.x_range(), y, stroke);
    }
}

pub(super) fn circle_visible(rect: Rect, center: Pos2, radius: f32) -> bool {
    rect.expand(radius).contains(center)
}

/// Cheap bounding-box test; anything touching the padded rect counts.
pub(super) fn edge_visible(rect: Rect, start: Pos2, end: Pos2, padding: f32) -> bool {
    Rect::from_two_pos(start, end).expand(padding).intersects(rect)
}

pub(super) fn world_to_screen(rect: Rect, pan: Vec2, zoom: f32, world: Vec2) -> Pos2 {
    rect.center() + pan + world * zoom
}

pub(super) fn screen_to_world(rect: Rect, pan: Vec2, zoom: f32, screen: Pos2) -> Vec2 {
    (screen - rect.center() - pan) / zoom
}

pub(super) fn node_radius(kind: NodeKind) -> f32 {
    match kind {
        NodeKind::Gateway => 12.0,
        NodeKind::Anchor => 9.5,
        NodeKind::Mobile => 8.0,
        NodeKind::Standard => 7.0,
    }
}

pub(super) fn kind_color(kind: NodeKind) -> Color32 {
    match kind {
        NodeKind::Gateway => Color32::from_rgb(240, 170, 60),
        NodeKind::Anchor => Color32::from_rgb(80, 170, 230),
        NodeKind::Mobile => Color32::from_rgb(110, 210, 130),
        NodeKind::Standard => Color32::from_rgb(170, 175, 190),
    }
}

pub(super) fn state_fade(state: EntityState) -> f32 {
    match state {
        EntityState::Active => 1.0,
        EntityState::Stale => 0.55,
        EntityState::Removed => 0.22,
    }
}

pub(super) fn edge_color(accuracy: AccuracyClass, state: EntityState) -> Color32 {
    let base = match accuracy {
        AccuracyClass::Accurate => Color32::from_rgba_unmultiplied(150, 180, 205, 190),
        AccuracyClass::TooClose => Color32::from_rgba_unmultiplied(225, 120, 200, 190),
        AccuracyClass::TooFar => Color32::from_rgba_unmultiplied(235, 110, 90, 190),
    };
    dim_color(base, state_fade(state))
}
