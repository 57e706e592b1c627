/// Half-away-from-zero rounding to `decimals` places.
pub fn round_to(value: f64, decimals: u32) -> f64 {
    let factor = 10f64.powi(decimals as i32);
    (value * factor).round() / factor
}

/// Writes competition-style positions (1, 1, 3, ...) onto already sorted
/// entries. Neighbours with equal keys share a position.
pub fn assign_positions<T, K, F, S>(entries: &mut [T], key: F, mut set: S)
where
    K: PartialEq,
    F: Fn(&T) -> K,
    S: FnMut(&mut T, u32),
{
    let mut previous: Option<(K, u32)> = None;
    for (idx, entry) in entries.iter_mut().enumerate() {
        let current = key(entry);
        let position = match &previous {
            Some((prev_key, prev_pos)) if *prev_key == current => *prev_pos,
            _ => idx as u32 + 1,
        };
        set(entry, position);
        previous = Some((current, position));
    }
}
