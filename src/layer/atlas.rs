//! Per-tile texture atlas packing for color layers. Used
//! only when the number of color layers on a tile would otherwise exceed
//! the renderer's texture-unit budget.

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LayerKey(pub u64);

#[derive(Debug, Clone, Copy)]
pub struct PackedBox {
    pub x: u32,
    pub y: u32,
    pub w: u32,
    pub h: u32,
}

/// Shelf packer: boxes are placed left-to-right on the current shelf; when a
/// box would overflow the shelf width, a new shelf starts above it. Layouts
/// are stable across incremental repacks as long as earlier layers keep
/// their sizes, since each layer keeps the same shelf position it had
/// before — only new/resized layers perturb the packing.
#[derive(Default)]
pub struct Atlas {
    boxes: std::collections::HashMap<LayerKey, PackedBox>,
    order: Vec<LayerKey>,
    max_width: u32,
    max_x: u32,
    max_y: u32,
}

impl Atlas {
    pub fn new(max_width: u32) -> Self {
        Self { boxes: Default::default(), order: Vec::new(), max_width, max_x: 0, max_y: 0 }
    }

    pub fn size(&self) -> (u32, u32) {
        (self.max_x, self.max_y)
    }

    pub fn get(&self, key: LayerKey) -> Option<PackedBox> {
        self.boxes.get(&key).copied()
    }

    /// Repacks from scratch, reusing `self.order` (the previous insertion
    /// order) as a seed so existing layers tend to keep similar positions;
    /// `sizes` gives each layer's `ceil(imageSize * resolutionFactor * 1.1)`
    /// box dimensions for this pass.
    pub fn repack(&mut self, sizes: impl IntoIterator<Item = (LayerKey, u32, u32)>) {
        let mut entries: Vec<(LayerKey, u32, u32)> = sizes.into_iter().collect();
        // Keep layers seen before in their previous relative order, append
        // new ones at the end — an incremental repack, not a sort from zero.
        let previous_order = self.order.clone();
        entries.sort_by_key(|(key, _, _)| previous_order.iter().position(|k| k == key).unwrap_or(usize::MAX));

        self.boxes.clear();
        self.order.clear();
        self.max_x = 0;
        self.max_y = 0;

        let mut shelf_x = 0u32;
        let mut shelf_y = 0u32;
        let mut shelf_height = 0u32;

        for (key, w, h) in entries {
            if shelf_x + w > self.max_width && shelf_x > 0 {
                shelf_y += shelf_height;
                shelf_x = 0;
                shelf_height = 0;
            }
            self.boxes.insert(key, PackedBox { x: shelf_x, y: shelf_y, w, h });
            self.order.push(key);
            shelf_x += w;
            shelf_height = shelf_height.max(h);
            self.max_x = self.max_x.max(shelf_x);
            self.max_y = self.max_y.max(shelf_y + shelf_height);
        }
    }
}

/// `ceil(size * factor * 1.1)`: the atlas box sizing rule.
pub fn box_size(image_size: (u32, u32), resolution_factor: f64) -> (u32, u32) {
    let f = |v: u32| -> u32 { (v as f64 * resolution_factor * 1.1).ceil() as u32 };
    (f(image_size.0), f(image_size.1))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn packs_boxes_without_overlap_within_shelf_width() {
        let mut atlas = Atlas::new(512);
        atlas.repack([(LayerKey(1), 300, 100), (LayerKey(2), 300, 100)]);
        let a = atlas.get(LayerKey(1)).unwrap();
        let b = atlas.get(LayerKey(2)).unwrap();
        // second box doesn't fit on the same shelf (300+300 > 512)
        assert_eq!(a.y, 0);
        assert_eq!(b.y, 100);
    }

    #[test]
    fn box_size_applies_ten_percent_padding() {
        assert_eq!(box_size((100, 100), 1.0), (110, 110));
    }
}
