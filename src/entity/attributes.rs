/// RGBA color with components in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl Color {
    pub const BLACK: Self = Self::rgb(0.0, 0.0, 0.0);
    pub const WHITE: Self = Self::rgb(1.0, 1.0, 1.0);
    pub const TRANSPARENT: Self = Self::rgba(0.0, 0.0, 0.0, 0.0);

    /// Opaque color.
    #[must_use]
    pub const fn rgb(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b, a: 1.0 }
    }

    /// Color with explicit alpha.
    #[must_use]
    pub const fn rgba(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }
}

/// Border line style.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BorderStyle {
    #[default]
    Solid,
    Dashed,
    Dotted,
    None,
}

/// Interior fill style.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FillStyle {
    #[default]
    None,
    Solid,
    Hatched,
}

/// What part of an entity the user may drag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DragCapability {
    #[default]
    None,
    /// Individual vertices.
    Part,
    /// The shape as a whole.
    Whole,
    /// Vertices and the whole shape.
    All,
}

/// How a spatial entity is drawn. Consumed only by the rendering layer.
#[derive(Debug, Clone, PartialEq)]
pub struct DisplayAttributes {
    pub border_color: Color,
    pub fill_color: Color,
    pub border_thickness: f64,
    pub border_style: BorderStyle,
    pub fill_style: FillStyle,
    /// Diameter used for point geometries.
    pub diameter: f64,
    pub label: Option<String>,
    pub drag_capability: DragCapability,
    pub editable: bool,
    pub movable: bool,
    /// Draw above every other entity regardless of band.
    pub topmost: bool,
}

impl Default for DisplayAttributes {
    fn default() -> Self {
        Self {
            border_color: Color::BLACK,
            fill_color: Color::TRANSPARENT,
            border_thickness: 1.0,
            border_style: BorderStyle::Solid,
            fill_style: FillStyle::None,
            diameter: 5.0,
            label: None,
            drag_capability: DragCapability::None,
            editable: false,
            movable: false,
            topmost: false,
        }
    }
}

impl DisplayAttributes {
    #[must_use]
    pub fn with_border(mut self, color: Color, thickness: f64, style: BorderStyle) -> Self {
        self.border_color = color;
        self.border_thickness = thickness;
        self.border_style = style;
        self
    }

    #[must_use]
    pub fn with_fill(mut self, color: Color, style: FillStyle) -> Self {
        self.fill_color = color;
        self.fill_style = style;
        self
    }

    #[must_use]
    pub fn with_diameter(mut self, diameter: f64) -> Self {
        self.diameter = diameter;
        self
    }

    #[must_use]
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Marks the entity editable with the given drag capability.
    #[must_use]
    pub fn editable(mut self, drag_capability: DragCapability, movable: bool) -> Self {
        self.editable = true;
        self.movable = movable;
        self.drag_capability = drag_capability;
        self
    }

    #[must_use]
    pub fn topmost(mut self) -> Self {
        self.topmost = true;
        self
    }
}
