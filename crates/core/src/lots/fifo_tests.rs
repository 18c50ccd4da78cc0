#[cfg(test)]
mod tests {
    use crate::errors::{CostBasisError, Error};
    use crate::lots::{
        consume_allocations, plan_fifo_sale, restore_allocations, sort_fifo, Lot,
    };
    use chrono::{DateTime, TimeZone, Utc};

    const DECIMALS: u32 = 4;

    fn shares(n: i64) -> i64 {
        n * 10_000
    }

    fn date(day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, day, 10, 0, 0).unwrap()
    }

    fn lot(id: &str, qty: i64, price: i64, fees: i64, day: u32) -> Lot {
        let mut lot = Lot::from_purchase("H1", shares(qty), DECIMALS, price, fees, date(day)).unwrap();
        lot.id = id.to_string();
        lot
    }

    #[test]
    fn test_lot_cost_includes_fees() {
        let lot = lot("L1", 10, 10_000, 500, 1);
        assert_eq!(lot.total_cost, 100_500);
        assert_eq!(lot.average_cost, 10_050);
        assert_eq!(lot.remaining_quantity, lot.quantity);
        assert!(lot.is_open());
        assert!(lot.is_untouched());
    }

    #[test]
    fn test_lot_rejects_non_positive_quantity() {
        let result = Lot::from_purchase("H1", 0, DECIMALS, 100, 0, date(1));
        assert!(matches!(result, Err(Error::Validation(_))));
    }

    #[test]
    fn test_sort_fifo_breaks_ties_by_id() {
        let mut lots = vec![lot("B", 1, 100, 0, 2), lot("C", 1, 100, 0, 1), lot("A", 1, 100, 0, 2)];
        sort_fifo(&mut lots);
        let ids: Vec<&str> = lots.iter().map(|l| l.id.as_str()).collect();
        assert_eq!(ids, vec!["C", "A", "B"]);
    }

    #[test]
    fn test_selling_oldest_lot_size_touches_only_that_lot() {
        let lots = vec![lot("L2", 50, 16_000, 0, 5), lot("L1", 100, 15_000, 0, 1)];

        let plan = plan_fifo_sale("H1", &lots, shares(100), DECIMALS, 17_000, 0).unwrap();

        assert_eq!(plan.allocations.len(), 1);
        assert_eq!(plan.allocations[0].lot_id, "L1");
        assert_eq!(plan.allocations[0].quantity, shares(100));
        assert_eq!(plan.cost_basis, 1_500_000);
        assert_eq!(plan.realized_pnl, 200_000);
    }

    #[test]
    fn test_sale_spanning_lots_consumes_oldest_first() {
        let mut lots = vec![
            lot("L3", 10, 12_000, 0, 9),
            lot("L1", 10, 10_000, 0, 1),
            lot("L2", 10, 11_000, 0, 4),
        ];

        let plan = plan_fifo_sale("H1", &lots, shares(25), DECIMALS, 13_000, 0).unwrap();
        let ids: Vec<&str> = plan.allocations.iter().map(|a| a.lot_id.as_str()).collect();
        assert_eq!(ids, vec!["L1", "L2", "L3"]);
        assert_eq!(plan.allocations[2].quantity, shares(5));

        // 10 @ 100 + 10 @ 110 + 5 @ 120
        assert_eq!(plan.cost_basis, 100_000 + 110_000 + 60_000);
        assert_eq!(plan.proceeds, 25 * 13_000);

        consume_allocations(&mut lots, &plan.allocations).unwrap();
        let l3 = lots.iter().find(|l| l.id == "L3").unwrap();
        assert_eq!(l3.remaining_quantity, shares(10) - shares(5));
        assert!(lots.iter().filter(|l| l.id != "L3").all(|l| !l.is_open()));
    }

    #[test]
    fn test_closed_lots_are_skipped() {
        let mut closed = lot("L1", 10, 10_000, 0, 1);
        closed.remaining_quantity = 0;
        let lots = vec![closed, lot("L2", 10, 20_000, 0, 2)];

        let plan = plan_fifo_sale("H1", &lots, shares(4), DECIMALS, 20_000, 0).unwrap();
        assert_eq!(plan.allocations.len(), 1);
        assert_eq!(plan.allocations[0].lot_id, "L2");
        assert_eq!(plan.realized_pnl, 0);
    }

    #[test]
    fn test_fees_charged_once_not_per_lot() {
        let lots = vec![lot("L1", 1, 10_000, 0, 1), lot("L2", 1, 10_000, 0, 2)];
        let plan = plan_fifo_sale("H1", &lots, shares(2), DECIMALS, 10_000, 250).unwrap();
        assert_eq!(plan.allocations.len(), 2);
        assert_eq!(plan.realized_pnl, -250);
    }

    #[test]
    fn test_no_open_lots() {
        let mut closed = lot("L1", 10, 10_000, 0, 1);
        closed.remaining_quantity = 0;

        let result = plan_fifo_sale("H1", &[closed], shares(1), DECIMALS, 10_000, 0);
        match result {
            Err(Error::CostBasis(err @ CostBasisError::NoOpenLots { .. })) => {
                assert!(err.is_integrity_fault())
            }
            other => panic!("expected NoOpenLots, got {:?}", other),
        }
    }

    #[test]
    fn test_open_lots_smaller_than_request() {
        let lots = vec![lot("L1", 3, 10_000, 0, 1)];
        let result = plan_fifo_sale("H1", &lots, shares(5), DECIMALS, 10_000, 0);
        assert!(matches!(
            result,
            Err(Error::CostBasis(CostBasisError::LotShortfall { open_quantity, .. })) if open_quantity == shares(3)
        ));
    }

    #[test]
    fn test_restore_undoes_consume() {
        let mut lots = vec![lot("L1", 10, 10_000, 0, 1), lot("L2", 10, 11_000, 0, 2)];
        let before = lots.clone();

        let plan = plan_fifo_sale("H1", &lots, shares(13), DECIMALS, 12_000, 0).unwrap();
        consume_allocations(&mut lots, &plan.allocations).unwrap();
        restore_allocations(&mut lots, &plan.allocations).unwrap();

        assert_eq!(lots, before);
    }

    #[test]
    fn test_restore_beyond_original_is_corrupt() {
        let mut lots = vec![lot("L1", 10, 10_000, 0, 1)];
        let plan = plan_fifo_sale("H1", &lots, shares(2), DECIMALS, 12_000, 0).unwrap();

        let result = restore_allocations(&mut lots, &plan.allocations);
        assert!(matches!(
            result,
            Err(Error::CostBasis(CostBasisError::CorruptLot { .. }))
        ));
    }
}
