//! LPDDR5 memory specification.
//!
//! LPDDR5 runs sixteen banks in bank-group mode; the `_S`/`_L` spacings fall
//! back to the flat values when a grade does not split them. Per-bank refresh is
//! supported alongside all-bank, and partial writes use MWR.

use super::{
    CatalogueParams, KeyMap, MaskedWriteSupport, MemSpec, MemoryType, RefreshIntervals, Timings,
    build_catalogue, cycles,
};
use crate::common::ConfigError;
use crate::common::time::SimTime;
use crate::config::MemSpecConfig;
use crate::controller::command::Command;

pub(super) fn build(cfg: &MemSpecConfig) -> Result<MemSpec, ConfigError> {
    const STD: &str = "LPDDR5";
    let arch = KeyMap::new(&cfg.architecture, STD);
    let time = KeyMap::new(&cfg.timings, STD);

    let channels = arch.req("nbrOfChannels")? as usize;
    let ranks = arch.req("nbrOfRanks")? as usize;
    let groups_per_rank = arch.opt("nbrOfBankGroups", 4) as usize;
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

    let tck = SimTime::from_ps(time.req("tCK")?);
    let burst_duration = tck.times(u64::from(burst_length / data_rate));

    let ccd = time.opt("CCD", 0);
    let rrd = time.opt("RRD", 0);
    let wtr = time.opt("WTR", 0);

    let timings = Timings {
        cke: cycles(tck, time.opt("CKE", 0)),
        ckesr: cycles(tck, time.opt("CKESR", 15)),
        pd: cycles(tck, time.opt("PD", time.opt("CKE", 0))),
        xp: cycles(tck, time.req("XP")?),
        xs: cycles(tck, time.req("XSR")?),
        ras: cycles(tck, time.req("RAS")?),
        rc: cycles(tck, time.opt("RC", time.req("RAS")? + time.req("RPPB")?)),
        rcd: cycles(tck, time.req("RCD")?),
        rl: cycles(tck, time.req("RL")?),
        wl: cycles(tck, time.req("WL")?),
        rtp: cycles(tck, time.req("RTP")?),
        wr: cycles(tck, time.req("WR")?),
        rp: cycles(tck, time.req("RPPB")?),
        refi: cycles(tck, time.req("REFIAB")?),
        refipb: cycles(tck, time.req("REFIPB")?),
        rfc: cycles(tck, time.req("RFCAB")?),
        rfcpb: cycles(tck, time.req("RFCPB")?),
        ccds: cycles(tck, time.opt("CCD_S", ccd)),
        ccdl: cycles(tck, time.opt("CCD_L", ccd)),
        rrds: cycles(tck, time.opt("RRD_S", rrd)),
        rrdl: cycles(tck, time.opt("RRD_L", rrd)),
        wtrs: cycles(tck, time.opt("WTR_S", wtr)),
        wtrl: cycles(tck, time.opt("WTR_L", wtr)),
        faw: cycles(tck, time.req("FAW")?),
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
            refresh_pb: true,
            ..CatalogueParams::default()
        },
    );

    let mut command_lengths = [tck.times(2); Command::COUNT];
    command_lengths[Command::Nop.idx()] = SimTime::ZERO;
    command_lengths[Command::Act.idx()] = tck.times(4);

    Ok(MemSpec {
        memory_id: cfg.memory_id.clone(),
        memory_type: MemoryType::Lpddr5,
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
        max_burst_length: arch.opt("maxBurstLength", u64::from(burst_length) * 2) as u32,
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
        masked_write: MaskedWriteSupport::MwrCommand,
        act_split_by_kind: false,
        constraints,
    })
}
