use std::collections::BTreeSet;

use model::{AltitudeMode, Feature, GeometryRef};
use render::{GeometryRole, Material, Primitive, PrimitiveClass, PrimitiveShape};
use tracing::{debug, warn};

use super::{ConvertContext, GeometryConverter, Slot};
use crate::altitude::resolve_altitude;
use crate::counters;
use crate::style::StyleDescriptor;

/// One primitive a leaf geometry wants for `role`.
///
/// `material` is `None` when the style gives the role nothing to draw (no
/// fill); `build` produces the vertex data on demand and returns `None` for
/// degenerate geometry.
pub struct RolePlan<'g> {
    pub role: GeometryRole,
    pub class: PrimitiveClass,
    pub material: Option<Material>,
    pub build: Box<dyn Fn() -> Option<PrimitiveShape> + 'g>,
}

impl<'g> RolePlan<'g> {
    pub fn new(
        role: GeometryRole,
        class: PrimitiveClass,
        material: Option<Material>,
        build: impl Fn() -> Option<PrimitiveShape> + 'g,
    ) -> Self {
        Self {
            role,
            class,
            material,
            build: Box::new(build),
        }
    }
}

/// Describes the primitives of one leaf geometry kind.
pub trait LeafPlanner {
    fn plans<'g>(
        &self,
        feature: &Feature,
        geometry: GeometryRef<'g>,
        style: &StyleDescriptor,
        altitude: AltitudeMode,
    ) -> Vec<RolePlan<'g>>;
}

/// Converter for a leaf geometry kind, driven by its [`LeafPlanner`].
#[derive(Debug, Default, Clone, Copy)]
pub struct LeafConverter<P>(pub P);

impl<P: LeafPlanner> GeometryConverter for LeafConverter<P> {
    fn create(
        &self,
        feature: &Feature,
        slot: &Slot,
        geometry: GeometryRef<'_>,
        style: &StyleDescriptor,
        ctx: &mut ConvertContext<'_>,
    ) -> bool {
        create_leaf(&self.0, feature, slot, geometry, style, ctx)
    }

    fn update(
        &self,
        feature: &Feature,
        slot: &Slot,
        geometry: GeometryRef<'_>,
        style: &StyleDescriptor,
        ctx: &mut ConvertContext<'_>,
    ) -> bool {
        update_leaf(&self.0, feature, slot, geometry, style, ctx)
    }
}

// All or nothing: either every drawable role gets its primitive or the slot
// ends up empty.
fn create_leaf(
    planner: &impl LeafPlanner,
    feature: &Feature,
    slot: &Slot,
    geometry: GeometryRef<'_>,
    style: &StyleDescriptor,
    ctx: &mut ConvertContext<'_>,
) -> bool {
    let altitude = resolve_altitude(ctx.layer, feature, slot.part_index());
    let mut built = Vec::new();
    for plan in planner.plans(feature, geometry, style, altitude) {
        let Some(material) = plan.material else {
            continue;
        };
        let Some(shape) = (plan.build)() else {
            debug!(
                feature = %slot.feature,
                path = %slot.path,
                kind = ?geometry.kind,
                "degenerate geometry, nothing to render"
            );
            ctx.scene.remove_subtree(slot.feature, &slot.path);
            return false;
        };
        built.push((plan.role, Primitive::new(plan.class, shape, material)));
    }

    let count = built.len() as u64;
    for (role, primitive) in built {
        let key = slot.key(role);
        if let Err(e) = ctx
            .scene
            .insert(key, primitive, geometry.kind, altitude, geometry.revision)
        {
            warn!(
                feature = %slot.feature,
                path = %slot.path,
                ?role,
                "primitive construction failed: {e}"
            );
            ctx.scene.remove_subtree(slot.feature, &slot.path);
            return false;
        }
    }
    ctx.metrics.inc_counter(counters::CREATED, count);
    true
}

// Role by role: rebuild vertex data only on a new revision or altitude,
// swap materials that changed, add or drop roles whose material appeared or
// vanished. Returns `false` when an entry needs a different primitive class.
fn update_leaf(
    planner: &impl LeafPlanner,
    feature: &Feature,
    slot: &Slot,
    geometry: GeometryRef<'_>,
    style: &StyleDescriptor,
    ctx: &mut ConvertContext<'_>,
) -> bool {
    let altitude = resolve_altitude(ctx.layer, feature, slot.part_index());
    let plans = planner.plans(feature, geometry, style, altitude);
    let planned: BTreeSet<GeometryRole> = plans.iter().map(|p| p.role).collect();
    let mut changed = false;

    for (key, _) in ctx.scene.entries_at(slot.feature, &slot.path) {
        if !planned.contains(&key.role) {
            ctx.scene.remove(&key);
            changed = true;
        }
    }

    for plan in plans {
        let key = slot.key(plan.role);
        let existing = ctx.scene.lookup(&key).copied();
        match (existing, plan.material) {
            (None, None) => {}
            (Some(_), None) => {
                ctx.scene.remove(&key);
                changed = true;
            }
            (None, Some(material)) => {
                let Some(shape) = (plan.build)() else {
                    return false;
                };
                let primitive = Primitive::new(plan.class, shape, material);
                if let Err(e) = ctx
                    .scene
                    .insert(key, primitive, geometry.kind, altitude, geometry.revision)
                {
                    warn!(
                        feature = %slot.feature,
                        path = %slot.path,
                        "primitive construction failed: {e}"
                    );
                    return false;
                }
                ctx.metrics.inc_counter(counters::CREATED, 1);
                changed = true;
            }
            (Some(entry), Some(material)) => {
                if entry.class != plan.class || entry.kind != geometry.kind {
                    return false;
                }
                let shape = if entry.revision != geometry.revision || entry.altitude != altitude {
                    match (plan.build)() {
                        Some(shape) => Some(shape),
                        None => return false,
                    }
                } else {
                    None
                };
                let material_stale = ctx
                    .scene
                    .primitive(&key)
                    .is_some_and(|p| p.material != material);
                if shape.is_none() && !material_stale {
                    ctx.scene.mark_live(&key);
                    continue;
                }

                let mut overwritten = true;
                let patched = ctx.scene.patch(&key, geometry.revision, altitude, |p| {
                    if let Some(shape) = &shape {
                        overwritten &= p.shape.overwrite_from(shape);
                    }
                    if material_stale {
                        p.material = material.clone();
                    }
                });
                if !patched || !overwritten {
                    return false;
                }
                changed = true;
            }
        }
    }

    let counter = if changed {
        counters::UPDATED
    } else {
        counters::SKIPPED
    };
    ctx.metrics.inc_counter(counter, 1);
    true
}
