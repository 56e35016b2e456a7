use crate::lookup::ItemCache;
use crate::model::ItemId;
use eframe::egui;

/// Pan, zoom and drag tracking for the run-area viewport.
///
/// The pan offset can only pull content up and left: both axes are clamped
/// to `<= 0` after every update, so the canvas never moves past its own
/// origin. Zoom is bounded to `[0.5, 1.0]`. Pan and zoom are independent;
/// placement combines them in `to_screen`.
pub struct CanvasTransform {
    offset: egui::Vec2,
    zoom: f32,
    drag_anchor: Option<egui::Pos2>,
}

impl CanvasTransform {
    pub const ZOOM_MIN: f32 = 0.5;
    pub const ZOOM_MAX: f32 = 1.0;
    // One wheel unit changes the zoom by 1/5000
    const WHEEL_DIVISOR: f32 = 5000.0;
    // The conceptual content plane is five viewports wide and tall; half
    // the spill on each side keeps the zoom anchored at the viewport
    // center band instead of the top-left corner.
    const CONTENT_SCALE: f32 = 5.0;

    pub fn new() -> CanvasTransform {
        CanvasTransform {
            offset: egui::vec2(0.0, 0.0),
            zoom: Self::ZOOM_MAX,
            drag_anchor: None,
        }
    }

    pub fn offset(&self) -> egui::Vec2 {
        self.offset
    }

    pub fn zoom(&self) -> f32 {
        self.zoom
    }

    pub fn is_dragging(&self) -> bool {
        self.drag_anchor.is_some()
    }

    /// Start a drag gesture at the pressed cursor position.
    pub fn begin_drag(&mut self, cursor: egui::Pos2) {
        self.drag_anchor = Some(cursor);
    }

    /// Apply one cursor move. The delta is measured against the previous
    /// move (the anchor is rebased every time), so deltas stay consecutive
    /// rather than cumulative from the press.
    pub fn drag_to(&mut self, cursor: egui::Pos2) {
        let Some(anchor) = self.drag_anchor else {
            return;
        };
        let change = anchor - cursor;
        self.offset -= change;
        self.clamp_offset();
        self.drag_anchor = Some(cursor);
    }

    /// End the gesture. Moves received afterwards are ignored.
    pub fn end_drag(&mut self) {
        self.drag_anchor = None;
    }

    /// Apply one wheel step. Positive delta (scroll down) zooms out toward
    /// the floor; negative zooms in toward full scale.
    pub fn wheel(&mut self, delta_y: f32) {
        self.zoom = (self.zoom - delta_y / Self::WHEEL_DIVISOR).clamp(Self::ZOOM_MIN, Self::ZOOM_MAX);
    }

    fn clamp_offset(&mut self) {
        self.offset.x = self.offset.x.min(0.0);
        self.offset.y = self.offset.y.min(0.0);
    }

    // Where content coordinate (0,0) lands on screen: translate by the pan
    // offset, then compensate by the scaled-away spill so the zoom origin
    // stays visually stable.
    fn content_origin(&self, viewport: egui::Rect) -> egui::Pos2 {
        let spill = viewport.size() * (Self::CONTENT_SCALE / 2.0) * (1.0 - self.zoom);
        viewport.min + self.offset - spill
    }

    /// Map a content-space position into screen space.
    pub fn to_screen(&self, viewport: egui::Rect, pos: egui::Pos2) -> egui::Pos2 {
        self.content_origin(viewport) + pos.to_vec2() * self.zoom
    }

    /// Pan so the given content position sits at the viewport center, as
    /// far as the clamp allows.
    pub fn focus_on(&mut self, viewport: egui::Rect, pos: egui::Pos2) {
        let spill = viewport.size() * (Self::CONTENT_SCALE / 2.0) * (1.0 - self.zoom);
        self.offset = (viewport.center() - viewport.min) + spill - pos.to_vec2() * self.zoom;
        self.clamp_offset();
    }
}

/// Item boxes are laid out in fixed rows of twelve.
pub const BOX_COLUMNS: usize = 12;

const BOX_SIZE: egui::Vec2 = egui::Vec2 { x: 120.0, y: 60.0 };
const BOX_GAP: f32 = 20.0;

/// Interaction reported by the run area.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum RunSignal {
    /// An item box was clicked; open it for editing.
    SelectItem(ItemId),
    /// The background was clicked; close any open picker.
    Background,
}

/// The pannable, zoomable canvas of item boxes for the current scene.
pub struct RunArea {
    pub view: CanvasTransform,
    items: Vec<ItemId>,
    focus_request: Option<ItemId>,
}

impl RunArea {
    pub fn new(items: Vec<ItemId>) -> RunArea {
        RunArea {
            view: CanvasTransform::new(),
            items,
            focus_request: None,
        }
    }

    /// Ask the canvas to pan to this item on the next frame.
    pub fn grab_focus(&mut self, id: ItemId) {
        self.focus_request = Some(id);
    }

    // Content-space top-left corner of the box at `index`.
    fn box_position(index: usize) -> egui::Pos2 {
        let row = index / BOX_COLUMNS;
        let col = index % BOX_COLUMNS;
        egui::pos2(
            BOX_GAP + col as f32 * (BOX_SIZE.x + BOX_GAP),
            BOX_GAP + row as f32 * (BOX_SIZE.y + BOX_GAP),
        )
    }

    pub fn show(&mut self, ui: &mut egui::Ui, cache: &mut ItemCache) -> Option<RunSignal> {
        let (response, painter) =
            ui.allocate_painter(ui.available_size(), egui::Sense::click_and_drag());
        let rect = response.rect;

        // Honor a pending grab-focus request
        if let Some(id) = self.focus_request.take() {
            if let Some(index) = self.items.iter().position(|item| *item == id) {
                let center = Self::box_position(index) + BOX_SIZE / 2.0;
                self.view.focus_on(rect, center);
            }
        }

        // One press-to-release gesture; the response scopes the listeners
        if response.drag_started() {
            if let Some(pos) = response.interact_pointer_pos() {
                self.view.begin_drag(pos);
            }
        }
        if response.dragged() {
            if let Some(pos) = response.interact_pointer_pos() {
                self.view.drag_to(pos);
            }
        }
        if response.drag_released() {
            self.view.end_drag();
        }

        // Wheel zoom while hovered. egui reports scroll-up as positive,
        // the zoom convention wants scroll-down positive.
        if response.hovered() {
            let scroll_y = ui.input(|i| i.scroll_delta.y);
            if scroll_y != 0.0 {
                self.view.wheel(-scroll_y);
            }
        }

        painter.rect_filled(rect, 0.0, egui::Color32::from_gray(24));

        let mut signal = None;
        let zoom = self.view.zoom();
        for (index, item) in self.items.iter().enumerate() {
            cache.ensure_item(*item);

            let min = self.view.to_screen(rect, Self::box_position(index));
            let box_rect = egui::Rect::from_min_size(min, BOX_SIZE * zoom);
            if !rect.intersects(box_rect) {
                continue;
            }

            let box_response = ui.interact(box_rect, response.id.with(index), egui::Sense::click());
            let fill = if box_response.hovered() {
                egui::Color32::from_gray(70)
            } else {
                egui::Color32::from_gray(48)
            };
            painter.rect_filled(box_rect, 4.0, fill);
            painter.text(
                box_rect.center(),
                egui::Align2::CENTER_CENTER,
                cache.description(*item),
                egui::FontId::proportional(12.0 * zoom),
                egui::Color32::WHITE,
            );

            if box_response.clicked() {
                signal = Some(RunSignal::SelectItem(*item));
            }
        }

        // A plain click on the canvas, not on a box
        if signal.is_none() && response.clicked() {
            signal = Some(RunSignal::Background);
        }

        signal
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pan_uses_consecutive_deltas() {
        let mut view = CanvasTransform::new();
        view.begin_drag(egui::pos2(100.0, 100.0));
        assert!(view.is_dragging());

        // Each move is measured against the previous one, not the press
        view.drag_to(egui::pos2(95.0, 90.0));
        assert_eq!(view.offset(), egui::vec2(-5.0, -10.0));

        view.drag_to(egui::pos2(90.0, 85.0));
        assert_eq!(view.offset(), egui::vec2(-10.0, -15.0));

        view.end_drag();
        assert!(!view.is_dragging());
        view.drag_to(egui::pos2(0.0, 0.0));
        assert_eq!(
            view.offset(),
            egui::vec2(-10.0, -15.0),
            "moves after release must be ignored"
        );
    }

    #[test]
    fn test_pan_clamps_to_origin() {
        let mut view = CanvasTransform::new();
        view.begin_drag(egui::pos2(0.0, 0.0));

        // Dragging down-right would push the canvas past its origin
        view.drag_to(egui::pos2(50.0, 30.0));
        assert_eq!(view.offset(), egui::vec2(0.0, 0.0));

        // The clamp holds after every update in any sequence
        let moves = [
            egui::pos2(20.0, 60.0),
            egui::pos2(-40.0, 10.0),
            egui::pos2(80.0, -30.0),
            egui::pos2(0.0, 0.0),
        ];
        for cursor in moves {
            view.drag_to(cursor);
            assert!(view.offset().x <= 0.0, "offset x must stay <= 0");
            assert!(view.offset().y <= 0.0, "offset y must stay <= 0");
        }
    }

    #[test]
    fn test_zoom_steps_and_bounds() {
        let mut view = CanvasTransform::new();
        assert_eq!(view.zoom(), 1.0);

        // Scroll down 100 units: zoom out by 0.02
        view.wheel(100.0);
        assert!((view.zoom() - 0.98).abs() < 1e-6);

        // Scroll back up past the ceiling
        view.wheel(-500.0);
        assert_eq!(view.zoom(), CanvasTransform::ZOOM_MAX);

        // The floor holds for any sequence
        for _ in 0..100 {
            view.wheel(400.0);
            assert!(view.zoom() >= CanvasTransform::ZOOM_MIN);
            assert!(view.zoom() <= CanvasTransform::ZOOM_MAX);
        }
        assert_eq!(view.zoom(), CanvasTransform::ZOOM_MIN);
    }

    #[test]
    fn test_to_screen_is_stable_at_full_zoom() {
        // With no pan and full zoom there is no spill: content (0,0) sits
        // at the viewport corner
        let view = CanvasTransform::new();
        let viewport = egui::Rect::from_min_size(egui::pos2(10.0, 20.0), egui::vec2(800.0, 600.0));
        assert_eq!(view.to_screen(viewport, egui::pos2(0.0, 0.0)), egui::pos2(10.0, 20.0));
        assert_eq!(
            view.to_screen(viewport, egui::pos2(100.0, 50.0)),
            egui::pos2(110.0, 70.0)
        );
    }

    #[test]
    fn test_focus_respects_clamp() {
        let mut view = CanvasTransform::new();
        let viewport = egui::Rect::from_min_size(egui::pos2(0.0, 0.0), egui::vec2(800.0, 600.0));

        // Focusing the content origin would need a positive offset; the
        // clamp wins
        view.focus_on(viewport, egui::pos2(0.0, 0.0));
        assert_eq!(view.offset(), egui::vec2(0.0, 0.0));

        // A far-away box pans up and left
        view.focus_on(viewport, egui::pos2(2000.0, 1500.0));
        assert_eq!(view.offset(), egui::vec2(-1600.0, -1200.0));
    }

    #[test]
    fn test_boxes_wrap_in_rows_of_twelve() {
        let first = RunArea::box_position(0);
        let last_in_row = RunArea::box_position(BOX_COLUMNS - 1);
        let second_row = RunArea::box_position(BOX_COLUMNS);

        assert_eq!(first.y, last_in_row.y, "first row shares one y");
        assert_eq!(second_row.x, first.x, "row 2 starts back at the left");
        assert!(second_row.y > first.y);
    }
}
