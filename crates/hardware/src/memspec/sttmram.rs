//! STT-MRAM memory specification.
//!
//! STT-MRAM presents a DDR3-class interface over a non-volatile array: there is
//! no refresh obligation at all, so every refresh interval is absent and only
//! `RefreshPolicy: NoRefresh` can be configured with it.

use super::{
    CatalogueParams, KeyMap, MaskedWriteSupport, MemSpec, MemoryType, RefreshIntervals, Timings,
    build_catalogue, cycles,
};
use crate::common::ConfigError;
use crate::common::time::SimTime;
use crate::config::MemSpecConfig;
use crate::controller::command::Command;

pub(super) fn build(cfg: &MemSpecConfig) -> Result<MemSpec, ConfigError> {
    const STD: &str = "STTMRAM";
    let arch = KeyMap::new(&cfg.architecture, STD);
    let time = KeyMap::new(&cfg.timings, STD);

    let channels = arch.req("nbrOfChannels")? as usize;
    let ranks = arch.req("nbrOfRanks")? as usize;
    let banks_per_rank = arch.req("nbrOfBanks")? as usize;
    let rows_per_bank = arch.req("nbrOfRows")?;
    let columns_per_row = arch.req("nbrOfColumns")?;
    let devices_per_rank = arch.opt("nbrOfDevices", 1) as usize;
    let bit_width = arch.req("width")? as u32;
    let burst_length = arch.opt("burstLength", 8) as u32;
    let data_rate = arch.opt("dataRate", 2) as u32;

    let tck = SimTime::from_ps(time.req("tCK")?);
    let burst_duration = tck.times(u64::from(burst_length / data_rate));

    let timings = Timings {
        cke: cycles(tck, time.opt("CKE", 3)),
        ckesr: cycles(tck, time.opt("CKESR", 4)),
        pd: cycles(tck, time.opt("PD", time.opt("CKE", 3))),
        xp: cycles(tck, time.req("XP")?),
        xs: cycles(tck, time.opt("XS", time.req("XP")?)),
        ras: cycles(tck, time.req("RAS")?),
        rc: cycles(tck, time.req("RC")?),
        rcd: cycles(tck, time.req("RCD")?),
        rl: cycles(tck, time.req("RL")?),
        wl: cycles(tck, time.req("WL")?),
        rtp: cycles(tck, time.req("RTP")?),
        wr: cycles(tck, time.req("WR")?),
        rp: cycles(tck, time.req("RP")?),
        ccd: cycles(tck, time.req("CCD")?),
        rrd: cycles(tck, time.req("RRD")?),
        wtr: cycles(tck, time.req("WTR")?),
        faw: cycles(tck, time.opt("FAW", 0)),
        rtrs: cycles(tck, time.opt("RTRS", 2)),
        dqsck: cycles(tck, time.opt("DQSCK", 0)),
        actpden: cycles(tck, time.opt("ACTPDEN", 1)),
        prpden: cycles(tck, time.opt("PRPDEN", 1)),
        ..Timings::default()
    };

    let constraints = build_catalogue(
        &timings,
        tck,
        burst_duration,
        CatalogueParams::default(),
    );

    let mut command_lengths = [tck; Command::COUNT];
    command_lengths[Command::Nop.idx()] = SimTime::ZERO;

    Ok(MemSpec {
        memory_id: cfg.memory_id.clone(),
        memory_type: MemoryType::SttMram,
        channels,
        pseudo_channels_per_channel: 1,
        ranks_per_channel: ranks,
        banks_per_rank,
        groups_per_rank: 1,
        banks_per_group: banks_per_rank,
        banks_per_channel: banks_per_rank * ranks,
        groups_per_channel: ranks,
        devices_per_rank,
        rows_per_bank,
        columns_per_row,
        burst_length,
        max_burst_length: burst_length,
        data_rate,
        bit_width,
        tck,
        burst_duration,
        timings,
        command_lengths,
        refresh: RefreshIntervals::default(),
        per2bank_offset: 0,
        rfm: None,
        masked_write: MaskedWriteSupport::DataMask,
        act_split_by_kind: false,
        constraints,
    })
}
