//! DDR4 memory specification.
//!
//! DDR4 introduces bank groups: CAS and activate spacings are split into `_S`
//! (different group) and `_L` (same group) flavours. Refresh is all-bank only.

use super::{
    CatalogueParams, KeyMap, MaskedWriteSupport, MemSpec, MemoryType, RefreshIntervals, Timings,
    build_catalogue, cycles,
};
use crate::common::ConfigError;
use crate::common::time::SimTime;
use crate::config::MemSpecConfig;
use crate::controller::command::Command;

pub(super) fn build(cfg: &MemSpecConfig) -> Result<MemSpec, ConfigError> {
    const STD: &str = "DDR4";
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
    let burst_length = arch.opt("burstLength", 8) as u32;
    let data_rate = arch.opt("dataRate", 2) as u32;

    if groups_per_rank == 0 || banks_per_rank % groups_per_rank != 0 {
        return Err(ConfigError::invalid(
            "MemSpec",
            "nbrOfBanks must be a multiple of nbrOfBankGroups",
        ));
    }

    let tck = SimTime::from_ps(time.req("tCK")?);
    let burst_duration = tck.times(u64::from(burst_length / data_rate));

    let timings = Timings {
        cke: cycles(tck, time.req("CKE")?),
        ckesr: cycles(tck, time.req("CKESR")?),
        pd: cycles(tck, time.opt("PD", time.opt("CKE", 0))),
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
        rfc: cycles(tck, time.req("RFC")?),
        ccds: cycles(tck, time.req("CCD_S")?),
        ccdl: cycles(tck, time.req("CCD_L")?),
        rrds: cycles(tck, time.req("RRD_S")?),
        rrdl: cycles(tck, time.req("RRD_L")?),
        wtrs: cycles(tck, time.req("WTR_S")?),
        wtrl: cycles(tck, time.req("WTR_L")?),
        faw: cycles(tck, time.req("FAW")?),
        rtrs: cycles(tck, time.opt("RTRS", 2)),
        dqsck: cycles(tck, time.opt("DQSCK", 0)),
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
            ..CatalogueParams::default()
        },
    );

    let mut command_lengths = [tck; Command::COUNT];
    command_lengths[Command::Nop.idx()] = SimTime::ZERO;

    Ok(MemSpec {
        memory_id: cfg.memory_id.clone(),
        memory_type: MemoryType::Ddr4,
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
            ..RefreshIntervals::default()
        },
        timings,
        command_lengths,
        per2bank_offset: 0,
        rfm: None,
        masked_write: MaskedWriteSupport::DataMask,
        act_split_by_kind: false,
        constraints,
    })
}
