/**
 * DÉCODEUR TRAMES CAPTEUR - Protocole ligne ESP32
 *
 * RÔLE : Transformer les trames texte du capteur en événements typés.
 * Deux grammaires : occupation (OCC:id:état:...;) et barrières (BAR:id:état:...;).
 *
 * CONTRAT : Ne lève jamais d'erreur sur une trame malformée - échec doux
 * uniquement (Frame::Unrecognized), la trame suivante bien formée supplante.
 */
use crate::models::GateKind;

const OCCUPANCY_PREFIX: &str = "OCC:";
const BARRIER_PREFIX: &str = "BAR:";
const FRAME_SUFFIX: char = ';';

/// Valeur sentinelle pour un token non numérique : hors plage, donc ignoré.
const INVALID_TOKEN: i32 = -1;

/// Résultat du décodage d'une trame brute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// Affectations (id emplacement, occupé) dans l'ordre de la trame.
    Occupancy(Vec<(u8, bool)>),
    /// Affectations (porton, ouvert) dans l'ordre de la trame.
    Barrier(Vec<(GateKind, bool)>),
    /// Format non reconnu - loggé puis ignoré par l'appelant.
    Unrecognized,
}

/// Décode une trame brute. `max_spaces` = N fixé par la config (ids valides 1..=N).
pub fn decode_frame(raw: &str, max_spaces: u8) -> Frame {
    let raw = raw.trim();
    if let Some(data) = strip_frame(raw, OCCUPANCY_PREFIX) {
        let assignments = parse_pairs(data)
            .filter(|&(id, _)| id >= 1 && id <= i32::from(max_spaces))
            .map(|(id, state)| (id as u8, state == 1))
            .collect();
        return Frame::Occupancy(assignments);
    }
    if let Some(data) = strip_frame(raw, BARRIER_PREFIX) {
        let assignments = parse_pairs(data)
            .filter_map(|(id, state)| {
                // 1 = porton d'entrée, 2 = sortie, tout autre id est ignoré
                let kind = match id {
                    1 => GateKind::Entry,
                    2 => GateKind::Exit,
                    _ => return None,
                };
                Some((kind, state == 1))
            })
            .collect();
        return Frame::Barrier(assignments);
    }
    Frame::Unrecognized
}

fn strip_frame<'a>(raw: &'a str, prefix: &str) -> Option<&'a str> {
    raw.strip_prefix(prefix)?.strip_suffix(FRAME_SUFFIX)
}

/// Paires (id, état) parcourues de gauche à droite avec un pas de 2.
/// Un token final orphelin est ignoré sans invalider le reste de la trame.
fn parse_pairs(data: &str) -> impl Iterator<Item = (i32, i32)> + '_ {
    let tokens: Vec<&str> = if data.is_empty() {
        Vec::new()
    } else {
        data.split(':').collect()
    };
    (0..tokens.len().saturating_sub(1))
        .step_by(2)
        .map(move |i| (parse_token(tokens[i]), parse_token(tokens[i + 1])))
        .collect::<Vec<_>>()
        .into_iter()
}

fn parse_token(token: &str) -> i32 {
    token.trim().parse().unwrap_or(INVALID_TOKEN)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_full_occupancy_frame() {
        let frame = decode_frame("OCC:1:1:2:0:3:0;", 3);
        assert_eq!(
            frame,
            Frame::Occupancy(vec![(1, true), (2, false), (3, false)])
        );
    }

    #[test]
    fn out_of_range_ids_are_silently_dropped() {
        assert_eq!(decode_frame("OCC:9:1;", 3), Frame::Occupancy(vec![]));
        assert_eq!(decode_frame("OCC:0:1;", 3), Frame::Occupancy(vec![]));
        assert_eq!(
            decode_frame("OCC:4:1:2:1;", 3),
            Frame::Occupancy(vec![(2, true)])
        );
    }

    #[test]
    fn non_numeric_tokens_count_as_out_of_range() {
        assert_eq!(decode_frame("OCC:abc:1;", 3), Frame::Occupancy(vec![]));
        // état non numérique -> sentinelle != 1 -> libre
        assert_eq!(
            decode_frame("OCC:2:xyz;", 3),
            Frame::Occupancy(vec![(2, false)])
        );
    }

    #[test]
    fn trailing_orphan_token_is_ignored() {
        assert_eq!(
            decode_frame("OCC:1:1:2;", 3),
            Frame::Occupancy(vec![(1, true)])
        );
    }

    #[test]
    fn empty_data_section_yields_empty_assignments() {
        assert_eq!(decode_frame("OCC:;", 3), Frame::Occupancy(vec![]));
        assert_eq!(decode_frame("BAR:;", 3), Frame::Barrier(vec![]));
    }

    #[test]
    fn missing_prefix_or_suffix_is_unrecognized() {
        assert_eq!(decode_frame("1:1:2:0;", 3), Frame::Unrecognized);
        assert_eq!(decode_frame("OCC:1:1", 3), Frame::Unrecognized);
        assert_eq!(decode_frame("", 3), Frame::Unrecognized);
        assert_eq!(decode_frame("PING", 3), Frame::Unrecognized);
    }

    #[test]
    fn duplicate_ids_keep_frame_order_for_last_write_wins() {
        // artefact du parcours pas-de-2 : la dernière paire gagne côté état
        let frame = decode_frame("OCC:1:1:1:0;", 3);
        assert_eq!(frame, Frame::Occupancy(vec![(1, true), (1, false)]));
    }

    #[test]
    fn decodes_barrier_frame_with_gate_mapping() {
        let frame = decode_frame("BAR:1:1:2:0;", 3);
        assert_eq!(
            frame,
            Frame::Barrier(vec![(GateKind::Entry, true), (GateKind::Exit, false)])
        );
    }

    #[test]
    fn unknown_barrier_ids_are_dropped() {
        assert_eq!(
            decode_frame("BAR:3:1:1:0;", 3),
            Frame::Barrier(vec![(GateKind::Entry, false)])
        );
    }

    #[test]
    fn surrounding_whitespace_is_tolerated() {
        assert_eq!(
            decode_frame("  OCC:1:1;\n", 3),
            Frame::Occupancy(vec![(1, true)])
        );
    }
}
