use model::{Feature, GeometryRef};
use tracing::debug;

use super::{ConvertContext, GeometryConverter, Slot, convert};
use crate::style::StyleDescriptor;

/// Multi-geometries and collections: every part is dispatched through the
/// registry at its own child slot.
///
/// Succeeds when at least one part converts; a failed part is logged and
/// left without entries. Parts beyond the current count (the geometry
/// shrank) are removed.
#[derive(Debug, Default, Clone, Copy)]
pub struct RecursiveConverter;

impl RecursiveConverter {
    fn convert_parts(
        &self,
        feature: &Feature,
        slot: &Slot,
        geometry: GeometryRef<'_>,
        style: &StyleDescriptor,
        ctx: &mut ConvertContext<'_>,
    ) -> bool {
        let parts = geometry.parts();
        let mut converted = 0usize;
        for (i, part) in parts.iter().enumerate() {
            let child = slot.child(i as u32);
            if convert(feature, &child, *part, style, ctx) {
                converted += 1;
            } else {
                debug!(
                    feature = %slot.feature,
                    path = %child.path,
                    kind = ?part.kind,
                    "skipping part that failed to convert"
                );
            }
        }
        ctx.scene
            .remove_children_from(slot.feature, &slot.path, parts.len() as u32);
        converted > 0
    }
}

impl GeometryConverter for RecursiveConverter {
    fn create(
        &self,
        feature: &Feature,
        slot: &Slot,
        geometry: GeometryRef<'_>,
        style: &StyleDescriptor,
        ctx: &mut ConvertContext<'_>,
    ) -> bool {
        self.convert_parts(feature, slot, geometry, style, ctx)
    }

    fn update(
        &self,
        feature: &Feature,
        slot: &Slot,
        geometry: GeometryRef<'_>,
        style: &StyleDescriptor,
        ctx: &mut ConvertContext<'_>,
    ) -> bool {
        self.convert_parts(feature, slot, geometry, style, ctx)
    }
}
