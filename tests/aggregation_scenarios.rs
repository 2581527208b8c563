//! End-to-end coverage of the rolling aggregation engine: bucket fan-out,
//! magnitude prefixes, participant counting and the rate cache, all driven
//! through the service callback over a real sled store.

mod common;

use common::{StaticReader, UNIT, addr, ctx, service};
use rust_decimal_macros::dec;
use synth_metrics::aggregate::{DAY_SECONDS, PERIODS, bucket_start};
use synth_metrics::entity::{
    ExchangeRecord, Exchanger, FeeRate, LatestRate, RateSource, SettlementRecord, TotalBucket,
};
use synth_metrics::event::{Event, ExchangeEvent};

/// Raw 18-digit rate of 0.0997 units of account per sETH.
const SETH_RATE: u128 = 99_700_000_000_000_000;

fn seth_reader() -> StaticReader {
    StaticReader::default().with_rate("sETH", 0x01, SETH_RATE)
}

fn exchange(account: u8, from_amount: u128, to_amount: u128) -> Event {
    Event::Exchange(ExchangeEvent::SynthExchange {
        account: addr(account),
        from_unit: "sUSD".to_owned(),
        to_unit: "sETH".to_owned(),
        from_amount,
        to_amount,
        to_address: addr(account),
    })
}

#[test]
fn exchange_lands_in_every_period_and_scope() -> anyhow::Result<()> {
    let (_dir, service) = service(seth_reader());

    // 5 sUSD for 50 sETH at 0.0997: 4.985 in the unit of account, 0.015 fee.
    service.handle_event(&ctx(100, 0, 1000), &exchange(0x11, 5 * UNIT, 50 * UNIT))?;

    for period in PERIODS {
        let start = bucket_start(1000, period);
        for scope in ["global", "sUSD", "sETH"] {
            let id = format!("{start}-0-{scope}-{period}");
            let bucket = service
                .store()
                .load::<TotalBucket>(&id)?
                .unwrap_or_else(|| panic!("missing bucket {id}"));
            assert_eq!(bucket.trades, 1);
            assert_eq!(bucket.exchangers, 1);
            assert_eq!(bucket.new_exchangers, 1);
            assert_eq!(bucket.volume_usd, dec!(5));
            assert_eq!(bucket.fees_usd, dec!(0.015));
        }
    }

    let record = service
        .store()
        .load::<ExchangeRecord>(&ctx(100, 0, 1000).record_id())?
        .unwrap();
    assert_eq!(record.from_amount_usd, dec!(5));
    assert_eq!(record.to_amount_usd, dec!(4.985));
    assert_eq!(record.fees_usd, dec!(0.015));
    Ok(())
}

#[test]
fn magnitude_buckets_form_a_prefix() -> anyhow::Result<()> {
    let (_dir, service) = service(seth_reader());

    // 250 in the unit of account qualifies for magnitudes 0, 1 and 2 only.
    service.handle_event(&ctx(100, 0, 1000), &exchange(0x11, 250 * UNIT, 1000 * UNIT))?;

    for magnitude in 0..3 {
        let id = format!("0-{magnitude}-global-0");
        assert!(service.store().load::<TotalBucket>(&id)?.is_some(), "missing {id}");
    }
    assert!(service.store().load::<TotalBucket>("0-3-global-0")?.is_none());
    Ok(())
}

#[test]
fn repeated_events_update_the_same_bucket() -> anyhow::Result<()> {
    let (_dir, service) = service(seth_reader());

    service.handle_event(&ctx(100, 0, 1000), &exchange(0x11, 5 * UNIT, 50 * UNIT))?;
    service.handle_event(&ctx(101, 0, 2000), &exchange(0x11, 5 * UNIT, 50 * UNIT))?;

    let bucket = service
        .store()
        .load::<TotalBucket>("0-0-global-86400")?
        .unwrap();
    assert_eq!(bucket.trades, 2);
    assert_eq!(bucket.volume_usd, dec!(10));
    assert_eq!(bucket.fees_usd, dec!(0.03));
    // Same participant both times.
    assert_eq!(bucket.exchangers, 1);
    assert_eq!(bucket.new_exchangers, 1);
    Ok(())
}

#[test]
fn new_participant_is_counted_once_per_account_globally() -> anyhow::Result<()> {
    let (_dir, service) = service(seth_reader());

    service.handle_event(&ctx(100, 0, 1000), &exchange(0x11, 5 * UNIT, 50 * UNIT))?;
    // Same account again two days later: known participant everywhere, even
    // in buckets it has never touched before.
    let later = 2 * DAY_SECONDS + 1000;
    service.handle_event(&ctx(200, 0, later), &exchange(0x11, 5 * UNIT, 50 * UNIT))?;
    // A second account is new again.
    service.handle_event(&ctx(201, 0, later), &exchange(0x22, 5 * UNIT, 50 * UNIT))?;

    let day_two_id = format!("{}-0-global-{DAY_SECONDS}", 2 * DAY_SECONDS);
    let day_two = service.store().load::<TotalBucket>(&day_two_id)?.unwrap();
    assert_eq!(day_two.trades, 2);
    assert_eq!(day_two.exchangers, 2);
    assert_eq!(day_two.new_exchangers, 1);

    let all_time = service.store().load::<TotalBucket>("0-0-global-0")?.unwrap();
    assert_eq!(all_time.trades, 3);
    assert_eq!(all_time.exchangers, 2);
    assert_eq!(all_time.new_exchangers, 2);

    let global = service
        .store()
        .load::<Exchanger>(&Exchanger::global_id(&addr(0x11)))?
        .unwrap();
    assert_eq!(global.trades, 2);
    assert_eq!(global.first_seen, 1000);
    assert_eq!(global.last_seen, later);
    Ok(())
}

#[test]
fn sub_unit_first_trade_registers_the_participant_without_touching_buckets() -> anyhow::Result<()> {
    let (_dir, service) = service(seth_reader());

    // Half a unit of account qualifies for no magnitude at all, so the trade
    // lands in no bucket. The participant record is still created, which
    // means the account is a known participant by its next trade.
    service.handle_event(&ctx(100, 0, 1000), &exchange(0x11, UNIT / 2, 5 * UNIT))?;

    assert!(service.store().load::<TotalBucket>("0-0-global-0")?.is_none());
    assert!(service
        .store()
        .load::<Exchanger>(&Exchanger::global_id(&addr(0x11)))?
        .is_some());

    service.handle_event(&ctx(101, 0, 2000), &exchange(0x11, 5 * UNIT, 50 * UNIT))?;
    let all_time = service.store().load::<TotalBucket>("0-0-global-0")?.unwrap();
    assert_eq!(all_time.exchangers, 1);
    assert_eq!(all_time.new_exchangers, 0);
    Ok(())
}

#[test]
fn negative_computed_fee_falls_back_to_default_rate() -> anyhow::Result<()> {
    let (_dir, service) = service(seth_reader());

    // 60 sETH at 0.0997 values above the 5 sUSD put in, so the computed fee
    // goes negative and the 30 basis point fallback applies to the gross.
    service.handle_event(&ctx(100, 0, 1000), &exchange(0x11, 5 * UNIT, 60 * UNIT))?;

    let record = service
        .store()
        .load::<ExchangeRecord>(&ctx(100, 0, 1000).record_id())?
        .unwrap();
    assert_eq!(record.fees_usd, dec!(0.015));
    Ok(())
}

#[test]
fn unknown_unit_abandons_the_event_without_partial_writes() -> anyhow::Result<()> {
    let (_dir, service) = service(seth_reader());

    let event = Event::Exchange(ExchangeEvent::SynthExchange {
        account: addr(0x11),
        from_unit: "sUSD".to_owned(),
        to_unit: "sXYZ".to_owned(),
        from_amount: 5 * UNIT,
        to_amount: 5 * UNIT,
        to_address: addr(0x11),
    });
    service.handle_event(&ctx(100, 0, 1000), &event)?;

    // The from-side rate resolved before the failure, but nothing of the
    // session may survive the abandoned event.
    assert!(service.store().export()?.is_empty());
    Ok(())
}

#[test]
fn resolved_rates_are_cached_across_events() -> anyhow::Result<()> {
    let (dir, service) = service(seth_reader());
    service.handle_event(&ctx(100, 0, 1000), &exchange(0x11, 5 * UNIT, 50 * UNIT))?;

    assert!(service.store().load::<RateSource>("sETH")?.is_some());
    assert_eq!(
        service.store().load::<LatestRate>("sETH")?.unwrap().rate,
        dec!(0.0997)
    );

    // Later events keep answering from the cache even when the reader no
    // longer knows the unit.
    drop(service);
    let service = common::reopen(&dir, StaticReader::default());
    service.handle_event(&ctx(101, 0, 2000), &exchange(0x11, 5 * UNIT, 50 * UNIT))?;

    let bucket = service.store().load::<TotalBucket>("0-0-global-0")?.unwrap();
    assert_eq!(bucket.trades, 2);
    Ok(())
}

#[test]
fn stable_aliases_register_together_at_a_fixed_rate() -> anyhow::Result<()> {
    let (_dir, service) = service(seth_reader());

    let event = Event::Exchange(ExchangeEvent::SynthExchange {
        account: addr(0x11),
        from_unit: "nUSD".to_owned(),
        to_unit: "sETH".to_owned(),
        from_amount: 5 * UNIT,
        to_amount: 50 * UNIT,
        to_address: addr(0x11),
    });
    service.handle_event(&ctx(100, 0, 1000), &event)?;

    assert_eq!(service.store().load::<LatestRate>("nUSD")?.unwrap().rate, dec!(1));
    assert_eq!(service.store().load::<LatestRate>("sUSD")?.unwrap().rate, dec!(1));
    Ok(())
}

#[test]
fn reclaims_and_rebates_are_recorded_separately() -> anyhow::Result<()> {
    let (_dir, service) = service(seth_reader());

    let reclaim = Event::Exchange(ExchangeEvent::ExchangeReclaim {
        account: addr(0x11),
        unit: "sETH".to_owned(),
        amount: 10 * UNIT,
    });
    let rebate = Event::Exchange(ExchangeEvent::ExchangeRebate {
        account: addr(0x11),
        unit: "sUSD".to_owned(),
        amount: 2 * UNIT,
    });
    service.handle_event(&ctx(100, 0, 1000), &reclaim)?;
    service.handle_event(&ctx(100, 1, 1000), &rebate)?;

    let reclaimed = service
        .store()
        .load::<SettlementRecord>(&ctx(100, 0, 1000).record_id())?
        .unwrap();
    assert!(reclaimed.reclaim);
    assert_eq!(reclaimed.amount_usd, dec!(0.997));

    let rebated = service
        .store()
        .load::<SettlementRecord>(&ctx(100, 1, 1000).record_id())?
        .unwrap();
    assert!(!rebated.reclaim);
    assert_eq!(rebated.amount_usd, dec!(2));

    // Settlements never touch the aggregate buckets.
    assert!(service.store().load::<TotalBucket>("0-0-global-0")?.is_none());
    Ok(())
}

#[test]
fn fee_rate_updates_overwrite_the_stored_rate() -> anyhow::Result<()> {
    let (_dir, service) = service(StaticReader::default());

    let update = |raw| Event::Exchange(ExchangeEvent::FeeRateUpdated {
        unit: "sETH".to_owned(),
        rate: raw,
    });
    service.handle_event(&ctx(100, 0, 1000), &update(3_000_000_000_000_000))?;
    service.handle_event(&ctx(101, 0, 1100), &update(5_000_000_000_000_000))?;

    let rate = service.store().load::<FeeRate>("sETH")?.unwrap();
    assert_eq!(rate.rate, dec!(0.005));
    Ok(())
}
