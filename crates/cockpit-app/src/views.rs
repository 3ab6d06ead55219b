//! Render-ready slices of the reconciled view.
//!
//! Each view either yields rows (flagged stale when the field is) or a
//! placeholder message when the field is insufficient.

use cockpit_chart::{render_equity, ChartGeometry, ChartLayout, ChartResult};
use cockpit_core::{Freshness, Position, PositionSide, SnapshotField, Trade};
use cockpit_feed::ReconciledView;
use serde::Serialize;

pub const NO_POSITIONS: &str = "No open positions";
pub const NO_TRADES: &str = "No trades yet";
pub const NO_EQUITY: &str = "Equity history unavailable";

/// Sign of a PnL figure, for colouring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PnlTone {
    Profit,
    Loss,
    Flat,
}

impl PnlTone {
    pub fn of(pnl: f64) -> Self {
        if pnl > 0.0 {
            Self::Profit
        } else if pnl < 0.0 {
            Self::Loss
        } else {
            Self::Flat
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TableView<R> {
    Rows { rows: Vec<R>, stale: bool },
    Placeholder { message: String },
}

impl<R> TableView<R> {
    fn from_field(freshness: Freshness, rows: Vec<R>, empty_message: &str) -> Self {
        if freshness.is_insufficient() || rows.is_empty() {
            return Self::Placeholder {
                message: empty_message.to_string(),
            };
        }
        Self::Rows {
            rows,
            stale: freshness.is_stale(),
        }
    }

    pub fn rows(&self) -> &[R] {
        match self {
            Self::Rows { rows, .. } => rows,
            Self::Placeholder { .. } => &[],
        }
    }

    pub fn placeholder(&self) -> Option<&str> {
        match self {
            Self::Placeholder { message } => Some(message),
            Self::Rows { .. } => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PositionRow {
    pub coin: String,
    pub side: PositionSide,
    pub qty: f64,
    pub entry: f64,
    /// Mark price; the entry price when the service sent none.
    pub mark: f64,
    pub leverage: f64,
    pub notional: f64,
    pub pnl: f64,
    pub tone: PnlTone,
}

impl From<&Position> for PositionRow {
    fn from(p: &Position) -> Self {
        let mark = if p.current > 0.0 { p.current } else { p.entry };
        Self {
            coin: p.coin.clone(),
            side: p.side,
            qty: p.qty,
            entry: p.entry,
            mark,
            leverage: p.lev,
            notional: p.qty.abs() * mark,
            pnl: p.pnl,
            tone: PnlTone::of(p.pnl),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TradeRow {
    pub time: String,
    pub coin: String,
    pub side: PositionSide,
    pub qty: f64,
    pub entry: f64,
    pub exit: f64,
    pub close_reason: String,
    /// PnL after fees.
    pub net_pnl: f64,
    pub tone: PnlTone,
}

impl From<&Trade> for TradeRow {
    fn from(t: &Trade) -> Self {
        let net_pnl = t.pnl - t.fees;
        Self {
            time: t.time.clone(),
            coin: t.coin.clone(),
            side: t.side,
            qty: t.qty,
            entry: t.entry,
            exit: t.exit,
            close_reason: t.close_reason.clone(),
            net_pnl,
            tone: PnlTone::of(net_pnl),
        }
    }
}

pub fn positions_view(view: &ReconciledView) -> TableView<PositionRow> {
    let rows = view
        .snapshot
        .positions
        .iter()
        .flatten()
        .map(PositionRow::from)
        .collect();
    TableView::from_field(view.freshness(SnapshotField::Positions), rows, NO_POSITIONS)
}

/// Most recent trade first.
pub fn trades_view(view: &ReconciledView) -> TableView<TradeRow> {
    let rows = view
        .snapshot
        .trades
        .iter()
        .flatten()
        .rev()
        .map(TradeRow::from)
        .collect();
    TableView::from_field(view.freshness(SnapshotField::Trades), rows, NO_TRADES)
}

#[derive(Debug, Clone, PartialEq)]
pub enum ChartPanel {
    Chart { geometry: ChartGeometry, stale: bool },
    Placeholder { message: String },
}

/// Equity chart geometry for the current view.
pub fn equity_chart(
    view: &ReconciledView,
    layout: &ChartLayout,
    hover: Option<usize>,
) -> ChartResult<ChartPanel> {
    let freshness = view.freshness(SnapshotField::Equity);
    let points = view.snapshot.equity.as_deref().unwrap_or_default();
    if freshness.is_insufficient() || points.is_empty() {
        return Ok(ChartPanel::Placeholder {
            message: NO_EQUITY.to_string(),
        });
    }
    Ok(ChartPanel::Chart {
        geometry: render_equity(points, layout, hover)?,
        stale: freshness.is_stale(),
    })
}
