/**
 * ÉTAT PARKING - Enregistrement autoritaire en mémoire
 *
 * RÔLE : Agrégat unique possédant les emplacements, portons, compteurs et
 * buckets horaires. Toute mutation passe par les méthodes de ParkingState,
 * jamais par des globales ambiantes - l'invariant mono-thread du pipeline
 * reste explicite et testable.
 *
 * FONCTIONNEMENT :
 * - apply_occupancy / apply_barrier retournent les changements effectifs
 *   (previous ≠ new) ; une trame qui réaffirme l'état courant ne produit rien
 * - stats_summary recalcule le résumé en entier (jamais stocké à part)
 * - sample_occupancy / update_hourly sont pilotés par les ticks périodiques
 */
use parking_lot::Mutex;
use rand::Rng;
use std::sync::Arc;
use std::time::Instant;
use time::OffsetDateTime;

use crate::models::{
    GateChange, GateKind, GatePhase, GateState, GateStatusPayload, HourlyBucket, SpaceChange,
    SpaceState, SpaceStatusPayload, StatsSummaryPayload,
};

pub type Shared<T> = Arc<Mutex<T>>;

pub fn new_state<T>(value: T) -> Shared<T> {
    Arc::new(Mutex::new(value))
}

/// Distance capteur initiale avant le premier événement (emplacement libre).
const INITIAL_DISTANCE_CM: u8 = 32;

pub struct ParkingState {
    spaces: Vec<SpaceState>,
    entry_gate: GateState,
    exit_gate: GateState,
    daily_entries: u32,
    total_changes_today: u32,
    peak_occupancy: u8,
    last_entry: OffsetDateTime,
    last_exit: OffsetDateTime,
    hourly: Vec<HourlyBucket>,
    hourly_date: time::Date,
    reset_hourly_at_midnight: bool,
    cumulative_occupied_samples: u64,
    sample_count: u64,
    average_occupancy_pct: u8,
    started: Instant,
}

impl ParkingState {
    pub fn new(total_spaces: u8, reset_hourly_at_midnight: bool, now: OffsetDateTime) -> Self {
        let spaces = (1..=total_spaces)
            .map(|id| SpaceState {
                id,
                occupied: false,
                distance_cm: INITIAL_DISTANCE_CM,
                sensor: format!("ESP32-SENSOR-{id}"),
                last_change: now,
            })
            .collect();
        let gate = GateState {
            phase: GatePhase::Closed,
            last_change: now,
        };
        let hourly = (0..24)
            .map(|hour| HourlyBucket::empty(hour, total_spaces, now))
            .collect();
        Self {
            spaces,
            entry_gate: gate.clone(),
            exit_gate: gate,
            daily_entries: 0,
            total_changes_today: 0,
            peak_occupancy: 0,
            last_entry: now,
            last_exit: now,
            hourly,
            hourly_date: now.date(),
            reset_hourly_at_midnight,
            cumulative_occupied_samples: 0,
            sample_count: 0,
            average_occupancy_pct: 0,
            started: Instant::now(),
        }
    }

    pub fn total_spaces(&self) -> u8 {
        self.spaces.len() as u8
    }

    pub fn occupied_spaces(&self) -> u8 {
        self.spaces.iter().filter(|s| s.occupied).count() as u8
    }

    pub fn space_ids(&self) -> Vec<u8> {
        self.spaces.iter().map(|s| s.id).collect()
    }

    /// Applique les affectations d'une trame OCC décodée et retourne les
    /// changements effectifs. Les affectations sont traitées dans l'ordre de
    /// la trame : en cas d'id dupliqué, la dernière écriture gagne.
    pub fn apply_occupancy(
        &mut self,
        assignments: &[(u8, bool)],
        now: OffsetDateTime,
    ) -> Vec<SpaceChange> {
        let mut changes = Vec::new();
        for &(id, occupied) in assignments {
            let Some(space) = self.spaces.iter_mut().find(|s| s.id == id) else {
                continue;
            };
            if space.occupied == occupied {
                continue;
            }
            let was_occupied = space.occupied;
            space.occupied = occupied;
            space.last_change = now;
            space.distance_cm = synthesize_distance(occupied);
            changes.push(SpaceChange {
                id,
                was_occupied,
                occupied,
            });
        }
        if !changes.is_empty() {
            self.record_changes(&changes, now);
            self.total_changes_today += 1;
        }
        changes
    }

    fn record_changes(&mut self, changes: &[SpaceChange], now: OffsetDateTime) {
        for change in changes {
            if change.is_entry() {
                // jamais décrémenté par les sorties
                self.daily_entries += 1;
            }
        }
        if changes.iter().any(|c| c.is_entry()) {
            self.last_entry = now;
        }
        if changes.iter().any(|c| c.is_exit()) {
            self.last_exit = now;
        }
        self.peak_occupancy = self.peak_occupancy.max(self.occupied_spaces());
    }

    /// Applique une trame BAR décodée : l'état barrière est autoritaire et
    /// immédiat, le porton bascule directement open/closed sans phases
    /// intermédiaires.
    pub fn apply_barrier(
        &mut self,
        assignments: &[(GateKind, bool)],
        now: OffsetDateTime,
    ) -> Vec<GateChange> {
        let mut changes = Vec::new();
        for &(kind, open) in assignments {
            let target = if open { GatePhase::Open } else { GatePhase::Closed };
            let gate = self.gate_mut(kind);
            let was_open = gate.phase == GatePhase::Open;
            if was_open == open {
                continue;
            }
            gate.phase = target;
            gate.last_change = now;
            changes.push(GateChange {
                kind,
                phase: target,
            });
        }
        changes
    }

    /// Positionne une phase de porton (séquence temporisée interne).
    pub fn set_gate_phase(&mut self, kind: GateKind, phase: GatePhase, now: OffsetDateTime) {
        let gate = self.gate_mut(kind);
        gate.phase = phase;
        gate.last_change = now;
    }

    pub fn gate_phase(&self, kind: GateKind) -> GatePhase {
        self.gate(kind).phase
    }

    fn gate(&self, kind: GateKind) -> &GateState {
        match kind {
            GateKind::Entry => &self.entry_gate,
            GateKind::Exit => &self.exit_gate,
        }
    }

    fn gate_mut(&mut self, kind: GateKind) -> &mut GateState {
        match kind {
            GateKind::Entry => &mut self.entry_gate,
            GateKind::Exit => &mut self.exit_gate,
        }
    }

    /// Échantillon d'occupation pris une fois par tick d'agrégation (jamais
    /// par événement) pour la moyenne glissante.
    pub fn sample_occupancy(&mut self) {
        self.cumulative_occupied_samples += u64::from(self.occupied_spaces());
        self.sample_count += 1;
        let mean = self.cumulative_occupied_samples as f64
            / self.sample_count as f64
            / f64::from(self.total_spaces())
            * 100.0;
        self.average_occupancy_pct = mean.round() as u8;
    }

    /// Écrase le bucket de l'heure courante avec le snapshot actuel.
    /// Idempotent dans la même heure ; seules voies de mutation des buckets.
    pub fn update_hourly(&mut self, now: OffsetDateTime) -> Vec<HourlyBucket> {
        if self.reset_hourly_at_midnight && now.date() != self.hourly_date {
            let total = self.total_spaces();
            for (hour, bucket) in self.hourly.iter_mut().enumerate() {
                *bucket = HourlyBucket::empty(hour as u8, total, now);
            }
        }
        self.hourly_date = now.date();
        let occupied = self.occupied_spaces();
        let hour = now.hour();
        self.hourly[usize::from(hour)] = HourlyBucket {
            hour: format!("{hour:02}:00"),
            occupied,
            available: self.total_spaces() - occupied,
            timestamp: now,
        };
        self.hourly.clone()
    }

    pub fn hourly_snapshot(&self) -> Vec<HourlyBucket> {
        self.hourly.clone()
    }

    /// Résumé recalculé en entier : occupancyRate est toujours dérivé des
    /// compteurs courants, jamais stocké indépendamment.
    pub fn stats_summary(&self, now: OffsetDateTime) -> StatsSummaryPayload {
        let total = self.total_spaces();
        let occupied = self.occupied_spaces();
        let rate = (f64::from(occupied) / f64::from(total) * 100.0).round() as u8;
        StatsSummaryPayload {
            total_spaces: total,
            occupied_spaces: occupied,
            available_spaces: total - occupied,
            daily_entries: self.daily_entries,
            occupancy_rate: rate,
            system_uptime: self.started.elapsed().as_secs(),
            last_entry: self.last_entry,
            last_exit: self.last_exit,
            timestamp: now,
            total_changes_today: self.total_changes_today,
            peak_occupancy: self.peak_occupancy,
            average_occupancy_today: self.average_occupancy_pct,
        }
    }

    pub fn space_payload(&self, id: u8, change: Option<SpaceChange>) -> Option<SpaceStatusPayload> {
        let space = self.spaces.iter().find(|s| s.id == id)?;
        Some(SpaceStatusPayload {
            occupied: space.occupied,
            distance: space.distance_cm,
            sensor: space.sensor.clone(),
            timestamp: space.last_change,
            battery: Some(synthesize_battery()),
            change_detected: change.map(|_| true),
            previous_state: change.map(|c| c.was_occupied),
        })
    }

    pub fn gate_payload(&self, kind: GateKind, action: Option<&str>) -> GateStatusPayload {
        let gate = self.gate(kind);
        GateStatusPayload {
            status: gate.phase,
            timestamp: gate.last_change,
            servo_angle: gate.phase.servo_angle(),
            action: action.map(str::to_string),
        }
    }

    pub fn daily_entries(&self) -> u32 {
        self.daily_entries
    }

    pub fn peak_occupancy(&self) -> u8 {
        self.peak_occupancy
    }

    pub fn average_occupancy_pct(&self) -> u8 {
        self.average_occupancy_pct
    }

    pub fn total_changes_today(&self) -> u32 {
        self.total_changes_today
    }
}

/// Re-synthèse de la distance pour imiter un capteur physique :
/// véhicule présent 5-15 cm, emplacement libre 25-40 cm.
fn synthesize_distance(occupied: bool) -> u8 {
    let mut rng = rand::thread_rng();
    if occupied {
        rng.gen_range(5..15)
    } else {
        rng.gen_range(25..40)
    }
}

fn synthesize_battery() -> f32 {
    85.0 + rand::thread_rng().gen_range(0.0..10.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn now() -> OffsetDateTime {
        OffsetDateTime::UNIX_EPOCH
    }

    fn state() -> ParkingState {
        ParkingState::new(3, false, now())
    }

    #[test]
    fn nominal_frame_on_all_free_state() {
        let mut st = state();
        let changes = st.apply_occupancy(&[(1, true), (2, false), (3, false)], now());
        assert_eq!(
            changes,
            vec![SpaceChange {
                id: 1,
                was_occupied: false,
                occupied: true
            }]
        );
        assert_eq!(st.daily_entries(), 1);
        let stats = st.stats_summary(now());
        assert_eq!(stats.occupied_spaces, 1);
        assert_eq!(stats.available_spaces, 2);
        assert_eq!(stats.occupancy_rate, 33);
    }

    #[test]
    fn reapplying_same_frame_produces_no_changes() {
        let mut st = state();
        let assignments = [(1, true), (2, false), (3, false)];
        assert_eq!(st.apply_occupancy(&assignments, now()).len(), 1);
        assert!(st.apply_occupancy(&assignments, now()).is_empty());
        assert_eq!(st.daily_entries(), 1);
        assert_eq!(st.total_changes_today(), 1);
    }

    #[test]
    fn occupied_plus_available_equals_total_for_reachable_states() {
        let mut st = state();
        let sequences: &[&[(u8, bool)]] = &[
            &[(1, true)],
            &[(2, true), (3, true)],
            &[(1, false), (2, false)],
            &[(3, false), (3, true)],
        ];
        for assignments in sequences {
            st.apply_occupancy(assignments, now());
            let stats = st.stats_summary(now());
            assert_eq!(
                stats.occupied_spaces + stats.available_spaces,
                stats.total_spaces
            );
        }
    }

    #[test]
    fn daily_entries_is_monotonic() {
        let mut st = state();
        let mut previous = 0;
        let sequences: &[&[(u8, bool)]] = &[
            &[(1, true)],
            &[(1, false)],
            &[(1, true), (2, true)],
            &[(2, false)],
            &[(3, true)],
        ];
        for assignments in sequences {
            st.apply_occupancy(assignments, now());
            assert!(st.daily_entries() >= previous);
            previous = st.daily_entries();
        }
        assert_eq!(st.daily_entries(), 4);
    }

    #[test]
    fn peak_never_decreases_and_covers_current_occupancy() {
        let mut st = state();
        st.apply_occupancy(&[(1, true), (2, true)], now());
        assert_eq!(st.peak_occupancy(), 2);
        st.apply_occupancy(&[(1, false), (2, false)], now());
        assert_eq!(st.peak_occupancy(), 2);
        st.apply_occupancy(&[(3, true)], now());
        assert!(st.peak_occupancy() >= st.occupied_spaces());
        assert_eq!(st.peak_occupancy(), 2);
    }

    #[test]
    fn unknown_space_id_leaves_records_untouched() {
        let mut st = state();
        // l'id 9 passe le décodeur seulement si N >= 9 ; garde-fou côté état
        let changes = st.apply_occupancy(&[(9, true)], now());
        assert!(changes.is_empty());
        assert_eq!(st.occupied_spaces(), 0);
        assert_eq!(st.total_changes_today(), 0);
    }

    #[test]
    fn duplicate_id_in_one_frame_resolves_last_write_wins() {
        let mut st = state();
        let changes = st.apply_occupancy(&[(1, true), (1, false)], now());
        // deux changements réels successifs, l'état final reste libre
        assert_eq!(changes.len(), 2);
        assert_eq!(st.occupied_spaces(), 0);
        // l'aller-retour compte une entrée (artefact du pas-de-2, préservé)
        assert_eq!(st.daily_entries(), 1);
    }

    #[test]
    fn distance_tracks_occupancy_ranges() {
        let mut st = state();
        st.apply_occupancy(&[(1, true)], now());
        let payload = st.space_payload(1, None).unwrap();
        assert!((5..15).contains(&payload.distance));
        st.apply_occupancy(&[(1, false)], now());
        let payload = st.space_payload(1, None).unwrap();
        assert!((25..40).contains(&payload.distance));
    }

    #[test]
    fn barrier_frame_snaps_gates_directly() {
        let mut st = state();
        let changes = st.apply_barrier(&[(GateKind::Entry, true), (GateKind::Exit, false)], now());
        assert_eq!(changes.len(), 1);
        assert_eq!(st.gate_phase(GateKind::Entry), GatePhase::Open);
        assert_eq!(st.gate_phase(GateKind::Exit), GatePhase::Closed);
        let payload = st.gate_payload(GateKind::Entry, Some("opening"));
        assert_eq!(payload.servo_angle, 90);

        // trame identique réappliquée : aucun changement
        let again = st.apply_barrier(&[(GateKind::Entry, true), (GateKind::Exit, false)], now());
        assert!(again.is_empty());
    }

    #[test]
    fn average_occupancy_is_a_running_mean_of_samples() {
        let mut st = state();
        st.apply_occupancy(&[(1, true), (2, true), (3, true)], now());
        st.sample_occupancy(); // 3/3
        st.apply_occupancy(&[(2, false), (3, false)], now());
        st.sample_occupancy(); // 1/3
        // (3 + 1) / 2 échantillons / 3 emplacements = 66.7 -> 67
        assert_eq!(st.average_occupancy_pct(), 67);
    }

    #[test]
    fn hourly_array_always_has_24_entries() {
        let mut st = state();
        assert_eq!(st.hourly_snapshot().len(), 24);
        let buckets = st.update_hourly(now());
        assert_eq!(buckets.len(), 24);
    }

    #[test]
    fn updating_hour_14_leaves_other_hours_untouched() {
        let mut st = state();
        let before = st.hourly_snapshot();
        st.apply_occupancy(&[(1, true)], now());
        let at_14 = OffsetDateTime::UNIX_EPOCH + time::Duration::hours(14);
        let after = st.update_hourly(at_14);
        assert_eq!(after[14].occupied, 1);
        assert_eq!(after[14].available, 2);
        for hour in (0..24).filter(|&h| h != 14) {
            assert_eq!(after[hour].occupied, before[hour].occupied);
            assert_eq!(after[hour].available, before[hour].available);
        }
    }

    #[test]
    fn hourly_update_is_idempotent_within_the_hour() {
        let mut st = state();
        st.apply_occupancy(&[(1, true)], now());
        let first = st.update_hourly(now());
        let second = st.update_hourly(now());
        assert_eq!(first[0].occupied, second[0].occupied);
        assert_eq!(first.len(), second.len());
    }

    #[test]
    fn midnight_reset_is_opt_in() {
        let day_one = OffsetDateTime::UNIX_EPOCH + time::Duration::hours(14);
        let day_two = day_one + time::Duration::days(1) - time::Duration::hours(13);

        // comportement historique : les buckets s'accumulent entre jours
        let mut st = ParkingState::new(3, false, day_one);
        st.apply_occupancy(&[(1, true)], day_one);
        st.update_hourly(day_one);
        st.apply_occupancy(&[(1, false)], day_two);
        let kept = st.update_hourly(day_two);
        assert_eq!(kept[14].occupied, 1);

        // reset explicite au changement de jour calendaire
        let mut st = ParkingState::new(3, true, day_one);
        st.apply_occupancy(&[(1, true)], day_one);
        st.update_hourly(day_one);
        st.apply_occupancy(&[(1, false)], day_two);
        let reset = st.update_hourly(day_two);
        assert_eq!(reset[14].occupied, 0);
    }

    #[test]
    fn last_entry_and_exit_stamps_follow_batches() {
        let mut st = state();
        let t1 = now() + time::Duration::seconds(10);
        st.apply_occupancy(&[(1, true)], t1);
        assert_eq!(st.stats_summary(t1).last_entry, t1);
        let t2 = t1 + time::Duration::seconds(10);
        st.apply_occupancy(&[(1, false)], t2);
        let stats = st.stats_summary(t2);
        assert_eq!(stats.last_entry, t1);
        assert_eq!(stats.last_exit, t2);
    }
}
