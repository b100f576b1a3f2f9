//! GDDR5X memory specification.
//!
//! GDDR5X keeps the GDDR5 shape but refreshes bank pairs: REFP2B covers bank
//! `b` and bank `b + banks/2` together.

use super::{
    CatalogueParams, KeyMap, MaskedWriteSupport, MemSpec, MemoryType, RefreshIntervals, Timings,
    build_catalogue, cycles,
};
use crate::common::ConfigError;
use crate::common::time::SimTime;
use crate::config::MemSpecConfig;
use crate::controller::command::Command;

pub(super) fn build(cfg: &MemSpecConfig) -> Result<MemSpec, ConfigError> {
    const STD: &str = "GDDR5X";
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
    let data_rate = arch.opt("dataRate", 4) as u32;

    if groups_per_rank == 0 || banks_per_rank % groups_per_rank != 0 {
        return Err(ConfigError::invalid(
            "MemSpec",
            "nbrOfBanks must be a multiple of nbrOfBankGroups",
        ));
    }
    if banks_per_rank % 2 != 0 {
        return Err(ConfigError::invalid(
            "MemSpec",
            "per-2-bank refresh needs an even bank count",
        ));
    }

    let tck = SimTime::from_ps(time.req("tCK")?);
    let burst_duration = tck.times(u64::from(burst_length / data_rate));

    let rrd = time.opt("RRD", 0);
    let pairs = banks_per_rank as u64 / 2;

    let timings = Timings {
        cke: cycles(tck, time.opt("CKE", 0)),
        ckesr: cycles(tck, time.opt("CKESR", 10)),
        pd: cycles(tck, time.opt("PD", time.opt("CKE", 0))),
        xp: cycles(tck, time.req("XP")?),
        xs: cycles(tck, time.req("XS")?),
        ras: cycles(tck, time.req("RAS")?),
        rc: cycles(tck, time.req("RC")?),
        rcdrd: cycles(tck, time.req("RCDRD")?),
        rcdwr: cycles(tck, time.req("RCDWR")?),
        rl: cycles(tck, time.req("RL")?),
        wl: cycles(tck, time.req("WL")?),
        rtp: cycles(tck, time.req("RTP")?),
        wr: cycles(tck, time.req("WR")?),
        rp: cycles(tck, time.req("RP")?),
        refi: cycles(tck, time.req("REFI")?),
        refip2b: cycles(tck, time.opt("REFIP2B", time.req("REFI")? / pairs)),
        rfc: cycles(tck, time.req("RFC")?),
        rfcp2b: cycles(tck, time.opt("RFCP2B", time.req("RFCPB")?)),
        rfcpb: cycles(tck, time.req("RFCPB")?),
        rrefd: cycles(tck, time.opt("RREFD", 0)),
        ccds: cycles(tck, time.req("CCDS")?),
        ccdl: cycles(tck, time.req("CCDL")?),
        rrds: cycles(tck, time.opt("RRDS", rrd)),
        rrdl: cycles(tck, time.opt("RRDL", rrd)),
        wtrs: cycles(tck, time.req("WTRS")?),
        wtrl: cycles(tck, time.req("WTRL")?),
        faw: cycles(tck, time.opt("FAW", time.opt("32AW", 0) / 8)),
        rtrs: cycles(tck, time.opt("RTRS", 1)),
        actpden: cycles(tck, time.opt("ACTPDEN", 1)),
        prpden: cycles(tck, time.opt("PRPDEN", 1)),
        refpden: cycles(tck, time.opt("REFPDEN", 1)),
        ..Timings::default()
    };

    let constraints = build_catalogue(
        &timings,
        tck,
        burst_duration,
        CatalogueParams {
            grouped: true,
            refresh_p2b: true,
            ..CatalogueParams::default()
        },
    );

    let mut command_lengths = [tck; Command::COUNT];
    command_lengths[Command::Nop.idx()] = SimTime::ZERO;

    Ok(MemSpec {
        memory_id: cfg.memory_id.clone(),
        memory_type: MemoryType::Gddr5x,
        channels,
        pseudo_channels_per_channel: 1,
        ranks_per_channel: ranks,
        banks_per_rank,
        groups_per_rank,
        banks_per_group: banks_per_rank / groups_per_rank,
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
            p2b: Some(timings.refip2b),
            ..RefreshIntervals::default()
        },
        timings,
        command_lengths,
        per2bank_offset: banks_per_rank / 2,
        rfm: None,
        masked_write: MaskedWriteSupport::Unsupported,
        act_split_by_kind: true,
        constraints,
    })
}
