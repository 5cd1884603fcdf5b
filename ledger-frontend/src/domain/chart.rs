//! Inline SVG bar chart for the monthly series.

use crate::domain::format::format_brl;
use crate::domain::monthly::{month_label, MonthlySeries};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use std::fmt::Write;

const PER_MONTH_WIDTH: f64 = 72.0;
const MIN_WIDTH: f64 = 760.0;
const HEIGHT: f64 = 380.0;
const PAD_LEFT: f64 = 70.0;
const PAD_RIGHT: f64 = 70.0;
const PAD_TOP: f64 = 20.0;
const PAD_BOTTOM: f64 = 80.0;
const TICKS: usize = 4;
const BAR_OFFSETS: [f64; 4] = [0.06, 0.30, 0.54, 0.78];
const BAR_WIDTH_RATIO: f64 = 0.16;

pub const LEGEND: [(&str, &str); 4] = [
    ("#3b82f6", "Vendas"),
    ("#10b981", "Recebido"),
    ("#ef4444", "Vendas Não Quitadas"),
    ("#fb923c", "Vendas Quitadas"),
];

/// Render sales, payments, unpaid and paid amounts as grouped bars.
/// Returns `None` when there is no month to draw.
pub fn render(series: &MonthlySeries) -> Option<String> {
    if series.is_empty() {
        return None;
    }

    let n = series.len();
    let width = MIN_WIDTH.max(n as f64 * PER_MONTH_WIDTH + 140.0);
    let inner_height = HEIGHT - PAD_TOP - PAD_BOTTOM;
    let groups: [&[Decimal]; 4] = [
        &series.sales,
        &series.payments,
        &series.unpaid_amounts,
        &series.paid_amounts,
    ];
    let max_value = groups
        .iter()
        .flat_map(|values| values.iter())
        .filter_map(|v| v.to_f64())
        .fold(1.0_f64, f64::max);
    let band = (width - PAD_LEFT - PAD_RIGHT) / n as f64;
    let bar_width = band * BAR_WIDTH_RATIO;
    let y_of = |value: f64| PAD_TOP + inner_height - (value / max_value) * inner_height;

    let mut svg = String::new();
    // Writing into a String cannot fail.
    let _ = write!(
        svg,
        r#"<svg xmlns="http://www.w3.org/2000/svg" viewBox="0 0 {w:.0} {h:.0}" width="{w:.0}" height="{h:.0}" role="img" aria-label="Vendas e pagamentos por mês">"#,
        w = width,
        h = HEIGHT
    );

    for i in 0..=TICKS {
        let value = (max_value * i as f64 / TICKS as f64).round();
        let y = y_of(value);
        let _ = write!(
            svg,
            r##"<line x1="{x1:.1}" y1="{y:.1}" x2="{x2:.1}" y2="{y:.1}" stroke="#eee"/><text x="{tx:.1}" y="{ty:.1}" font-size="11" text-anchor="end" fill="#666">{label}</text>"##,
            x1 = PAD_LEFT,
            x2 = width - PAD_RIGHT,
            tx = PAD_LEFT - 8.0,
            ty = y + 4.0,
            label = format_brl(Decimal::from_f64_retain(value).unwrap_or_default().round()),
        );
    }

    for (i, month) in series.months.iter().enumerate() {
        let x0 = PAD_LEFT + band * i as f64;
        for (slot, (group, (color, name))) in groups.iter().zip(LEGEND.iter()).enumerate() {
            let value = group.get(i).copied().unwrap_or_default();
            let v = value.to_f64().unwrap_or(0.0).max(0.0);
            let y = y_of(v);
            let _ = write!(
                svg,
                r#"<rect x="{x:.1}" y="{y:.1}" width="{bw:.1}" height="{bh:.1}" fill="{color}"><title>{name}: {amount}</title></rect>"#,
                x = x0 + band * BAR_OFFSETS[slot],
                bw = bar_width,
                bh = PAD_TOP + inner_height - y,
                amount = format_brl(value),
            );
        }
        if i > 0 {
            let _ = write!(
                svg,
                r##"<line x1="{x:.1}" y1="{top:.1}" x2="{x:.1}" y2="{bottom:.1}" stroke="#f3f3f3"/>"##,
                x = x0,
                top = PAD_TOP,
                bottom = PAD_TOP + inner_height,
            );
        }
        let _ = write!(
            svg,
            r##"<text x="{x:.1}" y="{y:.1}" font-size="11" text-anchor="middle" fill="#444">{label}</text>"##,
            x = x0 + band / 2.0,
            y = PAD_TOP + inner_height + 18.0,
            label = month_label(month),
        );
    }

    svg.push_str("</svg>");
    Some(svg)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn series(months: &[&str]) -> MonthlySeries {
        let n = months.len();
        MonthlySeries {
            months: months.iter().map(|m| m.to_string()).collect(),
            sales: vec![dec!(100); n],
            payments: vec![dec!(40); n],
            unpaid_counts: vec![1; n],
            unpaid_amounts: vec![dec!(60); n],
            paid_amounts: vec![dec!(40); n],
            cumulative_pending: vec![dec!(60); n],
        }
    }

    #[test]
    fn nothing_to_draw_without_months() {
        assert!(render(&MonthlySeries::default()).is_none());
    }

    #[test]
    fn draws_four_bars_per_month() {
        let svg = render(&series(&["2025-01", "2025-02"])).unwrap();
        assert!(svg.starts_with("<svg"));
        assert!(svg.ends_with("</svg>"));
        assert_eq!(svg.matches("<rect").count(), 8);
        assert!(svg.contains("jan/25"));
        assert!(svg.contains("fev/25"));
        assert!(svg.contains("R$ 100,00"));
    }

    #[test]
    fn widens_with_many_months() {
        let months: Vec<String> = (1..=12).map(|m| format!("2024-{:02}", m)).collect();
        let refs: Vec<&str> = months.iter().map(String::as_str).collect();
        let svg = render(&series(&refs)).unwrap();
        assert!(svg.contains(r#"width="1004""#));
    }
}
