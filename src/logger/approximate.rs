const THOUSAND: f64 = 1_000.0;
const MILLION: f64 = 1_000.0 * THOUSAND;
const BILLION: f64 = 1_000.0 * MILLION;
const TRILLION: f64 = 1_000.0 * BILLION;

/// Round a count to a friendly magnitude, e.g. `1501` becomes "~2k".
/// Values under a thousand are rendered exactly.
pub fn approximate(count: i64) -> String {
    let value = count as f64;

    let (scaled, suffix) = if value >= TRILLION {
        (value / TRILLION, "t")
    } else if value >= BILLION {
        (value / BILLION, "b")
    } else if value >= MILLION {
        (value / MILLION, "m")
    } else if value >= THOUSAND {
        (value / THOUSAND, "k")
    } else {
        return format!("{count}");
    };

    format!("~{:.0}{}", scaled.round(), suffix)
}
