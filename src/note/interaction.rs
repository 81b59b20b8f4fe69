/// Side of the square hit-zone in a note's bottom-right corner that starts a resize.
pub const RESIZE_HANDLE_SIZE: f64 = 15.0;

/// A document-relative pixel position.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }

    pub fn contains(&self, p: Point) -> bool {
        p.x >= self.x && p.x <= self.right() && p.y >= self.y && p.y <= self.bottom()
    }

    pub fn in_resize_handle(&self, p: Point) -> bool {
        self.contains(p)
            && p.x > self.right() - RESIZE_HANDLE_SIZE
            && p.y > self.bottom() - RESIZE_HANDLE_SIZE
    }
}

/// Which part of a note received a pointer event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotePart {
    /// Frame, header, or the resize corner.
    Body,
    /// The text editing region.
    Text,
}

/// Per-note pointer state: `Idle -> Dragging | Resizing -> Idle`.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum Interaction {
    #[default]
    Idle,
    /// `offset` is the pointer position minus the note origin at pointer-down.
    Dragging { offset: Point },
    Resizing,
}

impl Interaction {
    pub fn is_idle(&self) -> bool {
        matches!(self, Interaction::Idle)
    }

    /// Handle pointer-down on a note occupying `bounds`.
    pub fn begin(&mut self, pointer: Point, bounds: Rect, part: NotePart) -> bool {
        if part == NotePart::Text || !self.is_idle() {
            return false;
        }

        *self = if bounds.in_resize_handle(pointer) {
            Interaction::Resizing
        } else {
            Interaction::Dragging {
                offset: Point::new(pointer.x - bounds.x, pointer.y - bounds.y),
            }
        };
        true
    }

    /// Where the note origin belongs for this pointer position, if dragging.
    pub fn drag_target(&self, pointer: Point) -> Option<Point> {
        match self {
            Interaction::Dragging { offset } => {
                Some(Point::new(pointer.x - offset.x, pointer.y - offset.y))
            }
            _ => None,
        }
    }

    /// Pointer-up ends any interaction.
    pub fn end(&mut self) {
        *self = Interaction::Idle;
    }
}
