//! HBM2 memory specification.
//!
//! HBM2 channels can run in pseudo-channel mode (`nbrOfPseudoChannels = 2`),
//! halving the data width per pseudo channel and doubling the burst. ACT
//! occupies two beats on the row command bus, activate completion is
//! direction-dependent, and refresh is all-bank or per-bank. Same-bank refresh
//! is not offered even though devices advertise the interval.

use super::{
    CatalogueParams, KeyMap, MaskedWriteSupport, MemSpec, MemoryType, RefreshIntervals, Timings,
    build_catalogue, cycles,
};
use crate::common::ConfigError;
use crate::common::time::SimTime;
use crate::config::MemSpecConfig;
use crate::controller::command::Command;

pub(super) fn build(cfg: &MemSpecConfig) -> Result<MemSpec, ConfigError> {
    const STD: &str = "HBM2";
    let arch = KeyMap::new(&cfg.architecture, STD);
    let time = KeyMap::new(&cfg.timings, STD);

    let channels = arch.req("nbrOfChannels")? as usize;
    let pseudo_channels = arch.opt("nbrOfPseudoChannels", 1) as usize;
    let ranks = arch.req("nbrOfRanks")? as usize;
    let groups_per_rank = arch.req("nbrOfBankGroups")? as usize;
    let banks_per_rank = arch.req("nbrOfBanks")? as usize;
    let rows_per_bank = arch.req("nbrOfRows")?;
    let columns_per_row = arch.req("nbrOfColumns")?;
    let devices_per_rank = arch.opt("nbrOfDevices", 1) as usize;
    let bit_width = arch.req("width")? as u32;
    let data_rate = arch.opt("dataRate", 2) as u32;
    // Pseudo-channel mode doubles the burst to keep the access granularity.
    let burst_length = arch.opt("burstLength", if pseudo_channels == 2 { 4 } else { 2 }) as u32;

    if groups_per_rank == 0 || banks_per_rank % groups_per_rank != 0 {
        return Err(ConfigError::invalid(
            "MemSpec",
            "nbrOfBanks must be a multiple of nbrOfBankGroups",
        ));
    }

    let tck = SimTime::from_ps(time.req("tCK")?);
    let burst_duration = tck.times(u64::from(burst_length / data_rate));

    let timings = Timings {
        cke: cycles(tck, time.opt("CKE", 0)),
        ckesr: cycles(tck, time.opt("CKESR", 10)),
        pd: cycles(tck, time.opt("PD", 5)),
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
        refipb: cycles(tck, time.opt("REFIPB", time.req("REFI")? / banks_per_rank as u64)),
        rfc: cycles(tck, time.req("RFC")?),
        rfcpb: cycles(tck, time.req("RFCPB")?),
        rrefd: cycles(tck, time.opt("RREFD", 0)),
        ccds: cycles(tck, time.req("CCDS")?),
        ccdl: cycles(tck, time.req("CCDL")?),
        rrds: cycles(tck, time.req("RRDS")?),
        rrdl: cycles(tck, time.req("RRDL")?),
        wtrs: cycles(tck, time.req("WTRS")?),
        wtrl: cycles(tck, time.req("WTRL")?),
        faw: cycles(tck, time.req("FAW")?),
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
            refresh_pb: true,
            ..CatalogueParams::default()
        },
    );

    let mut command_lengths = [tck; Command::COUNT];
    command_lengths[Command::Nop.idx()] = SimTime::ZERO;
    command_lengths[Command::Act.idx()] = tck.times(2);

    Ok(MemSpec {
        memory_id: cfg.memory_id.clone(),
        memory_type: MemoryType::Hbm2,
        channels,
        pseudo_channels_per_channel: pseudo_channels,
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
            pb: Some(timings.refipb),
            ..RefreshIntervals::default()
        },
        timings,
        command_lengths,
        per2bank_offset: 0,
        rfm: None,
        masked_write: MaskedWriteSupport::DataMask,
        act_split_by_kind: true,
        constraints,
    })
}
