//! Sphere occlusion raytracing against celestial bodies.
//!
//! Pure functions — the lifecycle cache calls `star_visibility` once per
//! vessel per tick and every solar record on that vessel reuses the result.

use std::collections::HashMap;

use glam::DVec3;

use crate::{BodyId, BodyState};

/// Result of one vessel-to-body visibility query.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Visibility {
    pub visible: bool,
    /// Unit vector from the vessel toward the target body center.
    pub direction: DVec3,
    /// Distance from the vessel to the target body surface.
    pub distance: f64,
}

/// True when the ray from `origin` along unit `dir` is NOT blocked by the
/// sphere at `center` with `radius`.
///
/// A body behind the origin cannot occlude; otherwise the minimum distance
/// from the sphere center to the ray decides. Exact tangency counts as a
/// miss — a grazing ray does not occlude.
pub fn traces(origin: DVec3, dir: DVec3, center: DVec3, radius: f64) -> bool {
    let diff = center - origin;
    let k = diff.dot(dir);
    k < 0.0 || (dir * k - diff).length() >= radius
}

/// Visibility of `target` from `vessel_pos`.
///
/// The occluder set is: the vessel's main body (unless it is the target),
/// the main body's reference body (if one exists and is not the target),
/// and the main body's satellites — skipped when the main body is the star,
/// where satellites are many and occlusion chances are negligible.
pub fn star_visibility(
    bodies: &HashMap<BodyId, BodyState>,
    vessel_pos: DVec3,
    main_body: &BodyId,
    target: &BodyId,
) -> Visibility {
    let Some(target_body) = bodies.get(target) else {
        return Visibility {
            visible: false,
            direction: DVec3::ZERO,
            distance: 0.0,
        };
    };

    let mut direction = target_body.position - vessel_pos;
    let distance = direction.length();
    direction /= distance;
    let distance = distance - target_body.radius_m;

    let mut visible = true;
    let mut check = |body: &BodyState| {
        visible = visible && traces(vessel_pos, direction, body.position, body.radius_m);
    };

    if let Some(main) = bodies.get(main_body) {
        if main.id != *target {
            check(main);
        }
        if let Some(reference) = main
            .reference_body
            .as_ref()
            .filter(|id| **id != *target)
            .and_then(|id| bodies.get(id))
        {
            check(reference);
        }
        if main.id != *target {
            // main body is not the star: trace against its satellites too
            for satellite in main.satellites.iter().filter_map(|id| bodies.get(id)) {
                check(satellite);
            }
        }
    }

    Visibility {
        visible,
        direction,
        distance,
    }
}
