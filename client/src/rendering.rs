use macroquad::prelude::{
    clear_background, draw_circle, draw_circle_lines, draw_line, draw_rectangle,
    draw_rectangle_lines, draw_text, draw_triangle, vec2, Color, DARKGRAY, GREEN, RED, WHITE,
    YELLOW,
};
use shared::{
    Anchor, GameState, Mechanic, MechanicKind, PlayerId, PlayerState, Vec2, ARENA_HEIGHT,
    ARENA_WIDTH, PLAYER_RADIUS,
};

const HAZARD: Color = Color::new(1.0, 0.35, 0.1, 0.25);
const HAZARD_EDGE: Color = Color::new(1.0, 0.5, 0.2, 0.9);
const SAFE: Color = Color::new(0.3, 0.8, 1.0, 0.25);
const BACKGROUND: Color = Color::new(0.1, 0.1, 0.1, 1.0);
const FLOOR: Color = Color::new(0.17, 0.17, 0.2, 1.0);

/// HUD inputs that are not part of the snapshot.
#[derive(Debug, Clone)]
pub struct HudInfo {
    pub player_id: Option<PlayerId>,
    pub prediction_enabled: bool,
    pub reconciliation_enabled: bool,
    pub interpolation_enabled: bool,
    pub rtt_ms: Option<u64>,
    pub fake_ping_ms: u64,
    pub pending_inputs: usize,
    pub error: Option<String>,
}

/// Draws the arena in a fixed window, scaled to fit.
pub struct Renderer {
    scale: f32,
    offset: Vec2,
}

impl Renderer {
    pub fn new(width: f32, height: f32) -> Self {
        let scale = (width / ARENA_WIDTH).min(height / ARENA_HEIGHT);
        let offset = Vec2::new(
            (width - ARENA_WIDTH * scale) / 2.0,
            (height - ARENA_HEIGHT * scale) / 2.0,
        );
        Self { scale, offset }
    }

    fn to_screen(&self, p: Vec2) -> Vec2 {
        Vec2::new(p.x * self.scale + self.offset.x, p.y * self.scale + self.offset.y)
    }

    pub fn render(&self, state: Option<&GameState>, players: &[PlayerState], hud: &HudInfo) {
        clear_background(BACKGROUND);
        let origin = self.to_screen(Vec2::ZERO);
        draw_rectangle(
            origin.x,
            origin.y,
            ARENA_WIDTH * self.scale,
            ARENA_HEIGHT * self.scale,
            FLOOR,
        );

        if let Some(state) = state {
            for mechanic in &state.mechanics {
                self.draw_mechanic(mechanic, state.timestamp, players);
            }
        }

        for player in players {
            self.draw_player(player, Some(player.id) == hud.player_id);
        }

        self.draw_hud(hud, players.len());
    }

    fn draw_mechanic(&self, mechanic: &Mechanic, now: u64, players: &[PlayerState]) {
        let progress = mechanic.progress(now);
        let position_of = |id: PlayerId| players.iter().find(|p| p.id == id).map(|p| p.position);

        match &mechanic.kind {
            MechanicKind::Chariot { origin, radius } => {
                self.fill_circle(*origin, *radius, HAZARD);
                self.outline_circle(*origin, *radius * progress, HAZARD_EDGE);
            }
            MechanicKind::Dynamo {
                origin,
                inner_radius,
                outer_radius,
            } => {
                self.fill_circle(*origin, *outer_radius, HAZARD);
                self.fill_circle(*origin, *inner_radius, FLOOR);
                self.outline_circle(*origin, *inner_radius, HAZARD_EDGE);
            }
            MechanicKind::Spread { target, radius } => {
                if let Some(p) = position_of(*target) {
                    self.outline_circle(p, *radius, HAZARD_EDGE);
                }
            }
            MechanicKind::Stack { target, radius } => {
                if let Some(p) = position_of(*target) {
                    self.fill_circle(p, *radius, SAFE);
                }
            }
            MechanicKind::Tether {
                from,
                to,
                required_distance,
                ..
            } => {
                let resolve = |anchor: &Anchor| match anchor {
                    Anchor::Point(p) => Some(*p),
                    Anchor::Player(id) => position_of(*id),
                };
                if let (Some(a), Some(b)) = (resolve(from), resolve(to)) {
                    let color = if a.distance(b) >= *required_distance {
                        GREEN
                    } else {
                        RED
                    };
                    self.line(a, b, 3.0, color);
                }
            }
            MechanicKind::Tower {
                origin,
                radius,
                required_players,
                ..
            } => {
                self.fill_circle(*origin, *radius, SAFE);
                self.outline_circle(*origin, *radius, WHITE);
                let label = self.to_screen(*origin);
                draw_text(
                    &required_players.to_string(),
                    label.x - 4.0,
                    label.y + 5.0,
                    18.0,
                    WHITE,
                );
            }
            MechanicKind::RadialKnockback { origin, radius, .. } => {
                self.outline_circle(*origin, *radius, YELLOW);
                self.outline_circle(*origin, *radius * progress, HAZARD_EDGE);
            }
            MechanicKind::LinearKnockback { start, end, .. } => {
                self.line(*start, *end, 4.0, YELLOW);
                let mid = start.lerp(*end, 0.5);
                let push = (*end - *start).normalize().perpendicular() * 40.0;
                self.line(mid, mid + push, 2.0, YELLOW);
            }
            MechanicKind::LineAoe { start, end, width } => {
                let half = (*end - *start).normalize().perpendicular() * (width / 2.0);
                self.quad(*start + half, *end + half, *end - half, *start - half, HAZARD);
            }
            MechanicKind::ConalAoe {
                origin,
                direction,
                angle,
                radius,
            } => {
                const SEGMENTS: usize = 16;
                let first = direction - angle / 2.0;
                let step = angle / SEGMENTS as f32;
                for i in 0..SEGMENTS {
                    let a = *origin + Vec2::from_angle(first + step * i as f32) * *radius;
                    let b = *origin + Vec2::from_angle(first + step * (i + 1) as f32) * *radius;
                    self.triangle(*origin, a, b, HAZARD);
                }
            }
        }
    }

    fn draw_player(&self, player: &PlayerState, local: bool) {
        let center = self.to_screen(player.position);
        let radius = PLAYER_RADIUS * self.scale;
        let mut color = parse_color(&player.color).unwrap_or(WHITE);
        if !player.is_alive() {
            color = DARKGRAY;
        }

        draw_circle(center.x, center.y, radius, color);
        draw_circle_lines(
            center.x,
            center.y,
            radius,
            if local { 3.0 } else { 1.0 },
            WHITE,
        );

        let bar_width = radius * 2.0;
        let fill = (player.hp / player.max_hp).clamp(0.0, 1.0);
        let bar_y = center.y - radius - 8.0;
        draw_rectangle(center.x - radius, bar_y, bar_width, 4.0, DARKGRAY);
        draw_rectangle(center.x - radius, bar_y, bar_width * fill, 4.0, GREEN);

        draw_text(&player.name, center.x - radius, bar_y - 4.0, 14.0, WHITE);
        if !player.statuses.is_empty() {
            let labels: Vec<&str> = player.statuses.iter().map(|s| s.kind.label()).collect();
            draw_text(
                &labels.join(" "),
                center.x - radius,
                center.y + radius + 12.0,
                12.0,
                YELLOW,
            );
        }
    }

    fn draw_hud(&self, hud: &HudInfo, player_count: usize) {
        let y = 10.0;
        let size = 12.0;
        let features = [
            ("P", hud.prediction_enabled),
            ("R", hud.reconciliation_enabled),
            ("I", hud.interpolation_enabled),
        ];

        for (i, (label, enabled)) in features.iter().enumerate() {
            let x = 10.0 + i as f32 * 25.0;
            draw_rectangle(x, y, size, size, if *enabled { GREEN } else { RED });
            draw_rectangle_lines(x, y, size, size, 1.0, WHITE);
            draw_text(label, x + 3.0, y + size + 12.0, 12.0, WHITE);
        }

        let status = match (hud.player_id, &hud.error) {
            (Some(id), _) => format!("player {}  ({} online)", id, player_count),
            (None, Some(error)) => format!("not joined: {}", error),
            (None, None) => "joining...".to_string(),
        };
        draw_text(&status, 10.0, y + 45.0, 14.0, WHITE);

        let ping = match hud.rtt_ms {
            Some(rtt) => format!("rtt {}ms (fake {}ms)", rtt, hud.fake_ping_ms),
            None => format!("rtt ? (fake {}ms)", hud.fake_ping_ms),
        };
        draw_text(&ping, 10.0, y + 62.0, 14.0, WHITE);
        draw_text(
            &format!("unacked inputs: {}", hud.pending_inputs),
            10.0,
            y + 79.0,
            14.0,
            WHITE,
        );
    }

    fn fill_circle(&self, center: Vec2, radius: f32, color: Color) {
        let c = self.to_screen(center);
        draw_circle(c.x, c.y, radius * self.scale, color);
    }

    fn outline_circle(&self, center: Vec2, radius: f32, color: Color) {
        let c = self.to_screen(center);
        draw_circle_lines(c.x, c.y, radius * self.scale, 2.0, color);
    }

    fn line(&self, a: Vec2, b: Vec2, thickness: f32, color: Color) {
        let (a, b) = (self.to_screen(a), self.to_screen(b));
        draw_line(a.x, a.y, b.x, b.y, thickness, color);
    }

    fn triangle(&self, a: Vec2, b: Vec2, c: Vec2, color: Color) {
        let (a, b, c) = (self.to_screen(a), self.to_screen(b), self.to_screen(c));
        draw_triangle(vec2(a.x, a.y), vec2(b.x, b.y), vec2(c.x, c.y), color);
    }

    fn quad(&self, a: Vec2, b: Vec2, c: Vec2, d: Vec2, color: Color) {
        self.triangle(a, b, c, color);
        self.triangle(a, c, d, color);
    }
}

/// Parses `#rrggbb`.
pub fn parse_color(hex: &str) -> Option<Color> {
    let digits = hex.strip_prefix('#')?;
    if digits.len() != 6 {
        return None;
    }
    let channel = |i: usize| u8::from_str_radix(digits.get(i..i + 2)?, 16).ok();
    Some(Color::from_rgba(channel(0)?, channel(2)?, channel(4)?, 255))
}
