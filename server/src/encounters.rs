//! Built-in encounters, written against [`ScriptRunner`] only.

use crate::script::selectors;
use crate::script::{
    ContextValue, MechanicSpec, ScriptContext, ScriptError, ScriptHost, ScriptResult, ScriptRunner,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use shared::{
    Anchor, EffectSpec, MechanicId, MechanicKind, PeriodicDamage, StatusKind, Vec2, ARENA_CENTER,
    ARENA_HEIGHT, ARENA_WIDTH,
};
use std::f32::consts::{FRAC_PI_2, TAU};
use tokio::task::JoinHandle;

pub const ENCOUNTERS: [&str; 2] = ["demo", "drill"];

const DEMO_ROUNDS: u32 = 3;

/// Starts the named encounter, or returns `None` for an unknown name.
pub fn launch(name: &str, host: &ScriptHost) -> Option<JoinHandle<ScriptResult>> {
    match name {
        "demo" => Some(host.launch(name, demo)),
        "drill" => Some(host.launch(name, drill)),
        _ => None,
    }
}

/// Three rounds of every mechanic family: point AoEs, tethers, towers, then
/// knockbacks with lingering statuses.
pub async fn demo(runner: ScriptRunner, _ctx: ScriptContext) -> ScriptResult {
    let mut rng = StdRng::from_entropy();

    for round in 1..=DEMO_ROUNDS {
        runner.log(format!("Round {} of {}", round, DEMO_ROUNDS));

        runner.run(opening).await?;

        let state = runner.get_state().await?;
        let pair = selectors::random(&state, 2, &mut rng);
        let stack_target = selectors::random(&state, 1, &mut rng);
        let ctx = ScriptContext::new()
            .with("pair", ContextValue::Players(pair))
            .with("stack", ContextValue::Players(stack_target));
        runner.run_with(ctx, tethers).await?;

        runner.run(towers).await?;

        let ctx = ScriptContext::new().with("angle", rng.gen_range(0.0..TAU) as f64);
        runner.run_with(ctx, knockbacks).await?;

        if selectors::all_living(&runner.get_state().await?).is_empty() {
            runner.log("Party wiped");
            return Ok(());
        }
    }

    runner.log("Encounter cleared");
    Ok(())
}

/// Chariot then dynamo on the arena center.
async fn opening(runner: ScriptRunner, _ctx: ScriptContext) -> ScriptResult {
    let chariot = runner.spawn(
        MechanicSpec::new(MechanicKind::Chariot {
            origin: ARENA_CENTER,
            radius: 150.0,
        })
        .duration(4_000),
    )?;
    let dynamo = runner.spawn(
        MechanicSpec::new(MechanicKind::Dynamo {
            origin: ARENA_CENTER,
            inner_radius: 150.0,
            outer_radius: 600.0,
        })
        .trigger_at(7_000),
    )?;

    punish_on_resolve(runner.clone(), chariot, 40.0).await?;
    punish_on_resolve(runner, dynamo, 40.0).await
}

/// Tether between two players plus a stack on a third.
async fn tethers(runner: ScriptRunner, ctx: ScriptContext) -> ScriptResult {
    let pair = ctx.require_players("pair")?;
    let mut ids: Vec<MechanicId> = Vec::new();

    if let &[a, b] = pair.as_slice() {
        ids.push(runner.spawn(
            MechanicSpec::new(MechanicKind::Tether {
                from: Anchor::Player(a),
                to: Anchor::Player(b),
                required_distance: 300.0,
                damage: 30.0,
            })
            .duration(6_000),
        )?);
    }

    if let Some(&target) = ctx.require_players("stack")?.first() {
        let stack = runner.spawn(
            MechanicSpec::new(MechanicKind::Stack {
                target,
                radius: 80.0,
            })
            .duration(6_000),
        )?;
        runner.fork(share_damage(runner.clone(), stack, 120.0));
        ids.push(stack);
    }

    runner.wait_for_all(&ids).await?;
    Ok(())
}

/// Four corner towers, with a line and a cone cutting through the soak.
async fn towers(runner: ScriptRunner, _ctx: ScriptContext) -> ScriptResult {
    runner.at(0, |r| {
        for origin in corners(200.0) {
            r.spawn(
                MechanicSpec::new(MechanicKind::Tower {
                    origin,
                    radius: 60.0,
                    required_players: 1,
                    on_success: Some(EffectSpec::status(StatusKind::Vulnerability, 4_000)),
                    on_failure: Some(EffectSpec::damage(25.0)),
                })
                .trigger_at(8_000),
            )?;
        }
        Ok(())
    });

    runner.at(2_000, |r| {
        let line = r.spawn(
            MechanicSpec::new(MechanicKind::LineAoe {
                start: Vec2::new(0.0, ARENA_CENTER.y),
                end: Vec2::new(ARENA_WIDTH, ARENA_CENTER.y),
                width: 80.0,
            })
            .duration(3_000),
        )?;
        r.fork(punish_on_resolve(r.clone(), line, 30.0));
        Ok(())
    });

    runner.at(4_000, |r| {
        let cone = r.spawn(
            MechanicSpec::new(MechanicKind::ConalAoe {
                origin: ARENA_CENTER,
                direction: FRAC_PI_2,
                angle: FRAC_PI_2,
                radius: 400.0,
            })
            .duration(3_000),
        )?;
        r.fork(punish_on_resolve(r.clone(), cone, 30.0));
        Ok(())
    });

    runner.run_timeline().await?;
    let remaining = 8_000u64.saturating_sub(runner.elapsed());
    runner.wait(remaining + 500).await;
    Ok(())
}

/// Radial push from the center, a sweep from one side, then a bleed on
/// whoever ends up closest to the middle.
async fn knockbacks(runner: ScriptRunner, ctx: ScriptContext) -> ScriptResult {
    let angle = ctx.float("angle").unwrap_or(0.0) as f32;

    let radial = runner.spawn(
        MechanicSpec::new(MechanicKind::RadialKnockback {
            origin: ARENA_CENTER,
            radius: 400.0,
            distance: 200.0,
            knockback_ms: 600,
        })
        .duration(3_000),
    )?;
    runner.wait_for_resolve(radial).await?;

    let axis = Vec2::from_angle(angle) * (ARENA_WIDTH.max(ARENA_HEIGHT));
    let linear = runner.spawn(
        MechanicSpec::new(MechanicKind::LinearKnockback {
            start: ARENA_CENTER - axis,
            end: ARENA_CENTER + axis,
            distance: 150.0,
            knockback_ms: 400,
        })
        .delay(3_000),
    )?;
    runner.wait_for_resolve(linear).await?;

    let state = runner.get_state().await?;
    for player in selectors::nearest(&state, ARENA_CENTER, 1) {
        runner.apply_status_with(
            player,
            StatusKind::Bleed,
            4_000,
            Some(PeriodicDamage {
                amount: 5.0,
                interval_ms: 1_000,
            }),
            None,
        )?;
    }
    for player in selectors::farthest(&state, ARENA_CENTER, 1) {
        runner.apply_status_with(player, StatusKind::Doom, 6_000, None, Some(20.0))?;
    }
    Ok(())
}

/// Endless alternating chariot and dynamo on random players, until the party
/// is dead.
pub async fn drill(runner: ScriptRunner, _ctx: ScriptContext) -> ScriptResult {
    let mut rng = StdRng::from_entropy();
    let mut round: u64 = 0;

    loop {
        let state = runner.get_state().await?;
        let Some(target) = selectors::random(&state, 1, &mut rng).first().copied() else {
            runner.log("Nobody left standing");
            return Ok(());
        };
        let origin = state
            .player(target)
            .map(|p| p.position)
            .ok_or_else(|| ScriptError::Failed(format!("player {} vanished", target)))?;

        let kind = if round % 2 == 0 {
            MechanicKind::Chariot {
                origin,
                radius: 120.0,
            }
        } else {
            MechanicKind::Dynamo {
                origin,
                inner_radius: 120.0,
                outer_radius: 500.0,
            }
        };

        let id = runner.spawn(MechanicSpec::new(kind).duration(3_000))?;
        punish_on_resolve(runner.clone(), id, 20.0).await?;
        runner.wait(1_000).await;
        round += 1;
    }
}

/// Damages everyone the mechanic hit.
async fn punish_on_resolve(runner: ScriptRunner, id: MechanicId, amount: f32) -> ScriptResult {
    let resolution = runner.wait_for_resolve(id).await?;
    for player in resolution.hits {
        runner.damage(player, amount)?;
    }
    Ok(())
}

/// Splits `total` across everyone inside the stack.
async fn share_damage(runner: ScriptRunner, id: MechanicId, total: f32) -> ScriptResult {
    let resolution = runner.wait_for_resolve(id).await?;
    if resolution.hits.is_empty() {
        return Ok(());
    }
    let share = total / resolution.hits.len() as f32;
    for player in resolution.hits {
        runner.damage(player, share)?;
    }
    Ok(())
}

fn corners(inset: f32) -> [Vec2; 4] {
    [
        Vec2::new(inset, inset),
        Vec2::new(ARENA_WIDTH - inset, inset),
        Vec2::new(inset, ARENA_HEIGHT - inset),
        Vec2::new(ARENA_WIDTH - inset, ARENA_HEIGHT - inset),
    ]
}
