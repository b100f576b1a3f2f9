//! DDR5 memory specification.
//!
//! DDR5 keeps the DDR4 bank-group split and adds same-bank refresh (REFsb) and
//! refresh management: RFM thresholds come from the `RAAIMT`/`RAAMMT`/`RAADEC`
//! keys when present.

use super::{
    CatalogueParams, KeyMap, MaskedWriteSupport, MemSpec, MemoryType, RefreshIntervals, RfmSpec,
    Timings, build_catalogue, cycles,
};
use crate::common::ConfigError;
use crate::common::time::SimTime;
use crate::config::MemSpecConfig;
use crate::controller::command::Command;

pub(super) fn build(cfg: &MemSpecConfig) -> Result<MemSpec, ConfigError> {
    const STD: &str = "DDR5";
    let arch = KeyMap::new(&cfg.architecture, STD);
    let time = KeyMap::new(&cfg.timings, STD);

    let channels = arch.req("nbrOfChannels")? as usize;
    let ranks = arch.req("nbrOfRanks")? as usize;
    let groups_per_rank = arch.req("nbrOfBankGroups")? as usize;
    let banks_per_rank = arch.req("nbrOfBanks")? as usize;
    let rows_per_bank = arch.req("nbrOfRows")?;
    let columns_per_row = arch.req("nbrOfColumns")?;
    let devices_per_rank = arch.opt("nbrOfDevices", 1) as usize;
    let bit_width = arch.req("width")? as u32;
    let burst_length = arch.opt("burstLength", 16) as u32;
    let data_rate = arch.opt("dataRate", 2) as u32;

    if groups_per_rank == 0 || banks_per_rank % groups_per_rank != 0 {
        return Err(ConfigError::invalid(
            "MemSpec",
            "nbrOfBanks must be a multiple of nbrOfBankGroups",
        ));
    }
    let banks_per_group = banks_per_rank / groups_per_rank;

    let tck = SimTime::from_ps(time.req("tCK")?);
    let burst_duration = tck.times(u64::from(burst_length / data_rate));

    let timings = Timings {
        cke: cycles(tck, time.opt("CKE", 0)),
        ckesr: cycles(tck, time.req("CKESR")?),
        pd: cycles(tck, time.opt("PD", 8)),
        xp: cycles(tck, time.req("XP")?),
        xs: cycles(tck, time.req("XS")?),
        ras: cycles(tck, time.req("RAS")?),
        rc: cycles(tck, time.req("RC")?),
        rcd: cycles(tck, time.req("RCD")?),
        rl: cycles(tck, time.req("RL")?),
        wl: cycles(tck, time.req("WL")?),
        rtp: cycles(tck, time.req("RTP")?),
        wr: cycles(tck, time.req("WR")?),
        rp: cycles(tck, time.req("RP")?),
        refi: cycles(tck, time.req("REFI")?),
        refisb: cycles(tck, time.opt("REFISB", time.req("REFI")? / banks_per_group as u64)),
        rfc: cycles(tck, time.req("RFC")?),
        rfcsb: cycles(tck, time.req("RFCSB")?),
        rrefd: cycles(tck, time.opt("RREFD", 0)),
        ccds: cycles(tck, time.req("CCD_S")?),
        ccdl: cycles(tck, time.req("CCD_L")?),
        rrds: cycles(tck, time.req("RRD_S")?),
        rrdl: cycles(tck, time.req("RRD_L")?),
        wtrs: cycles(tck, time.req("WTR_S")?),
        wtrl: cycles(tck, time.req("WTR_L")?),
        faw: cycles(tck, time.req("FAW")?),
        rtrs: cycles(tck, time.opt("RTRS", 2)),
        dqsck: cycles(tck, time.opt("DQSCK", 0)),
        actpden: cycles(tck, time.opt("ACTPDEN", 2)),
        prpden: cycles(tck, time.opt("PRPDEN", 2)),
        refpden: cycles(tck, time.opt("REFPDEN", 2)),
        ..Timings::default()
    };

    let rfm = match (
        cfg.timings.get("RAAIMT"),
        cfg.timings.get("RAAMMT"),
        cfg.timings.get("RAADEC"),
    ) {
        (Some(&raaimt), Some(&raammt), Some(&raadec)) => Some(RfmSpec {
            raaimt,
            raammt,
            raadec,
        }),
        _ => None,
    };

    let constraints = build_catalogue(
        &timings,
        tck,
        burst_duration,
        CatalogueParams {
            grouped: true,
            refresh_sb: true,
            rfm: rfm.is_some(),
            ..CatalogueParams::default()
        },
    );

    let mut command_lengths = [tck; Command::COUNT];
    command_lengths[Command::Nop.idx()] = SimTime::ZERO;
    // Two-cycle CA frames for row commands.
    command_lengths[Command::Act.idx()] = tck.times(2);

    Ok(MemSpec {
        memory_id: cfg.memory_id.clone(),
        memory_type: MemoryType::Ddr5,
        channels,
        pseudo_channels_per_channel: 1,
        ranks_per_channel: ranks,
        banks_per_rank,
        groups_per_rank,
        banks_per_group,
        banks_per_channel: banks_per_rank * ranks,
        groups_per_channel: groups_per_rank * ranks,
        devices_per_rank,
        rows_per_bank,
        columns_per_row,
        burst_length,
        max_burst_length: burst_length,
        data_rate,
        bit_width,
        tck,
        burst_duration,
        refresh: RefreshIntervals {
            ab: Some(timings.refi),
            sb: Some(timings.refisb),
            ..RefreshIntervals::default()
        },
        timings,
        command_lengths,
        per2bank_offset: 0,
        rfm,
        masked_write: MaskedWriteSupport::MwrCommand,
        act_split_by_kind: false,
        constraints,
    })
}
