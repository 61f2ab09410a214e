//! Fast path for geometries that move every animation tick.

use model::{AltitudeMode, Feature, GeometryRef, ShapeRef};
use render::PrimitiveShape;
use tracing::trace;

use crate::altitude::resolve_altitude;
use crate::converters::{ConvertContext, LeafPlanner, LinePlanner, PolygonPlanner, RolePlan, Slot};
use crate::counters;
use crate::style::StyleDescriptor;

/// Plans for the dynamic kinds; a dynamic multipolygon is one merged fill
/// and one merged outline rather than a part per polygon.
#[derive(Debug, Default, Clone, Copy)]
pub struct DynamicPlanner;

impl LeafPlanner for DynamicPlanner {
    fn plans<'g>(
        &self,
        feature: &Feature,
        geometry: GeometryRef<'g>,
        style: &StyleDescriptor,
        altitude: AltitudeMode,
    ) -> Vec<RolePlan<'g>> {
        match geometry.shape {
            ShapeRef::LineString(_) => LinePlanner.plans(feature, geometry, style, altitude),
            ShapeRef::Polygon(_) | ShapeRef::MultiPolygon(_) => {
                PolygonPlanner.plans(feature, geometry, style, altitude)
            }
            _ => Vec::new(),
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum AdapterOutcome {
    /// Revision and material unchanged; entries only marked live.
    NoOp,
    /// Buffers and/or material patched in place.
    Patched,
    /// Nothing to patch in place; run the regular converter.
    NeedsConversion,
}

/// Patches the primitives of a dynamic geometry in place when only its
/// positions (or its material) changed.
///
/// Equal revisions leave the primitive and its buffers untouched. A new
/// revision overwrites the existing position and index buffers, keeping the
/// primitive handle and the allocations. Anything structural (no entries
/// yet, another kind, another altitude, a role appearing or vanishing)
/// is left to the converter.
#[derive(Debug, Default, Clone, Copy)]
pub struct DynamicAdapter;

impl DynamicAdapter {
    pub fn apply(
        &self,
        feature: &Feature,
        slot: &Slot,
        geometry: GeometryRef<'_>,
        style: &StyleDescriptor,
        ctx: &mut ConvertContext<'_>,
    ) -> AdapterOutcome {
        if !geometry.kind.is_dynamic() {
            return AdapterOutcome::NeedsConversion;
        }
        let existing = ctx.scene.entries_under(slot.feature, &slot.path);
        if existing.is_empty() {
            return AdapterOutcome::NeedsConversion;
        }
        let altitude = resolve_altitude(ctx.layer, feature, slot.part_index());
        let stable = existing.iter().all(|(key, entry)| {
            key.path == slot.path && entry.kind == geometry.kind && entry.altitude == altitude
        });
        if !stable {
            return AdapterOutcome::NeedsConversion;
        }

        let plans: Vec<RolePlan<'_>> = DynamicPlanner
            .plans(feature, geometry, style, altitude)
            .into_iter()
            .filter(|plan| plan.material.is_some())
            .collect();
        let same_roles = plans.len() == existing.len()
            && plans.iter().all(|plan| {
                existing
                    .iter()
                    .any(|(key, entry)| key.role == plan.role && entry.class == plan.class)
            });
        if !same_roles {
            return AdapterOutcome::NeedsConversion;
        }

        // Decide everything before touching the renderer so a degenerate
        // frame cannot leave some roles patched and others stale.
        let mut patches = Vec::with_capacity(plans.len());
        for plan in &plans {
            let key = slot.key(plan.role);
            let Some(entry) = ctx.scene.lookup(&key).copied() else {
                return AdapterOutcome::NeedsConversion;
            };
            let shape: Option<PrimitiveShape> = if entry.revision != geometry.revision {
                match (plan.build)() {
                    Some(shape) => Some(shape),
                    None => return AdapterOutcome::NeedsConversion,
                }
            } else {
                None
            };
            let material = plan
                .material
                .clone()
                .filter(|m| ctx.scene.primitive(&key).is_some_and(|p| p.material != *m));
            patches.push((key, shape, material));
        }

        if patches.iter().all(|(_, shape, material)| shape.is_none() && material.is_none()) {
            for (key, _, _) in &patches {
                ctx.scene.mark_live(key);
            }
            ctx.metrics.inc_counter(counters::SKIPPED, 1);
            return AdapterOutcome::NoOp;
        }

        for (key, shape, material) in patches {
            let mut overwritten = true;
            let patched = ctx.scene.patch(&key, geometry.revision, altitude, |p| {
                if let Some(shape) = &shape {
                    overwritten &= p.shape.overwrite_from(shape);
                }
                if let Some(material) = &material {
                    p.material = material.clone();
                }
            });
            if !patched || !overwritten {
                return AdapterOutcome::NeedsConversion;
            }
        }
        trace!(
            feature = %slot.feature,
            revision = geometry.revision,
            "patched dynamic geometry in place"
        );
        ctx.metrics.inc_counter(counters::UPDATED, 1);
        AdapterOutcome::Patched
    }
}
