//! Shared test infrastructure.
//!
//! Provides:
//! - **Config builders**: complete JSON bundles for DDR3, LPDDR4, and HBM2
//!   test devices with small, hand-checkable timing numbers.
//! - **Transaction builders**: fully tagged transactions for driving a
//!   controller without the arbiter.
//! - **`Bench`**: a miniature event loop around one controller that emulates
//!   the arbiter-side handshake (serialized BEGIN_REQ, immediate END_RESP one
//!   cycle after BEGIN_RESP) and records commands, acks, and responses.

use std::collections::{BTreeSet, VecDeque};
use std::sync::Arc;

use dramsim_core::common::coords::{Bank, BankGroup, Channel, Column, Rank, Row, Thread};
use dramsim_core::common::time::SimTime;
use dramsim_core::common::transaction::{
    ArbiterTag, ControllerTag, TransId, TransKind, Transaction, TransactionPool,
};
use dramsim_core::config::Config;
use dramsim_core::controller::{CommandRecord, Controller, UpstreamPhase};
use dramsim_core::memspec::MemSpec;

/// DDR3 test device: 1 channel, 1 rank, 8 banks, 64 Ki rows, 1 Ki columns,
/// x8 devices, 8 per rank (4 GiB, 32 mapping bits). `tCK` = 1 ns.
pub fn ddr3_json() -> String {
    r#"{
      "mcconfig": { "PagePolicy": "Closed", "Scheduler": "Fifo", "RefreshPolicy": "NoRefresh" },
      "simconfig": {},
      "memspec": {
        "memoryId": "test-ddr3",
        "memoryType": "DDR3",
        "memarchitecturespec": {
          "nbrOfChannels": 1, "nbrOfRanks": 1, "nbrOfBanks": 8,
          "nbrOfRows": 65536, "nbrOfColumns": 1024,
          "nbrOfDevices": 8, "width": 8, "burstLength": 8, "dataRate": 2
        },
        "memtimingspec": {
          "tCK": 1000,
          "CKE": 3, "CKESR": 4, "RAS": 28, "RC": 39, "RCD": 11, "RL": 11,
          "RTP": 6, "WL": 8, "WR": 12, "XP": 4, "XS": 512, "REFI": 6240,
          "RFC": 208, "RP": 11, "CCD": 4, "FAW": 24, "RRD": 5, "WTR": 6,
          "RTRS": 2
        }
      },
      "addressmapping": {
        "BYTE_BIT": [0, 1, 2],
        "COLUMN_BIT": [3, 4, 5, 6, 7, 8, 9, 10, 11, 12],
        "BANK_BIT": [13, 14, 15],
        "ROW_BIT": [16, 17, 18, 19, 20, 21, 22, 23, 24, 25, 26, 27, 28, 29, 30, 31]
      }
    }"#
    .to_owned()
}

/// DDR3 test device with two ranks (rank bit 32).
pub fn ddr3_two_rank_json() -> String {
    ddr3_json()
        .replace(r#""nbrOfRanks": 1"#, r#""nbrOfRanks": 2"#)
        .replace(
            r#""BYTE_BIT": [0, 1, 2],"#,
            r#""BYTE_BIT": [0, 1, 2], "RANK_BIT": [32],"#,
        )
}

/// LPDDR4 test device: 1 channel, 1 rank, 8 banks, 32 Ki rows, 1 Ki columns,
/// one x16 device (64 MiB, 26 mapping bits). `tCK` = 1.25 ns.
pub fn lpddr4_json() -> String {
    r#"{
      "mcconfig": { "PagePolicy": "Open", "Scheduler": "FrFcfs", "RefreshPolicy": "AllBank" },
      "simconfig": {},
      "memspec": {
        "memoryId": "test-lpddr4",
        "memoryType": "LPDDR4",
        "memarchitecturespec": {
          "nbrOfChannels": 1, "nbrOfRanks": 1, "nbrOfBanks": 8,
          "nbrOfRows": 32768, "nbrOfColumns": 64,
          "nbrOfDevices": 1, "width": 16, "burstLength": 16, "dataRate": 2
        },
        "memtimingspec": {
          "tCK": 1250,
          "CKE": 8, "XP": 8, "XSR": 280, "RAS": 34, "RCD": 15, "RL": 28,
          "WL": 14, "RTP": 8, "WR": 28, "RPPB": 15,
          "REFIAB": 3123, "REFIPB": 390, "RFCAB": 224, "RFCPB": 112,
          "CCD": 8, "RRD": 8, "WTR": 10, "FAW": 32, "DQSCK": 2
        }
      },
      "addressmapping": {
        "BYTE_BIT": [0],
        "COLUMN_BIT": [1, 2, 3, 4, 5, 6],
        "BANK_BIT": [7, 8, 9],
        "ROW_BIT": [10, 11, 12, 13, 14, 15, 16, 17, 18, 19, 20, 21, 22, 23, 24]
      }
    }"#
    .to_owned()
}

/// HBM2 test device in pseudo-channel mode: 16 banks in 4 groups, 16 Ki rows,
/// 64 columns, one x128 device (256 MiB, 28 mapping bits). `tCK` = 1 ns.
pub fn hbm2_json() -> String {
    r#"{
      "mcconfig": { "PagePolicy": "Open", "Scheduler": "FrFcfs", "RefreshPolicy": "NoRefresh" },
      "simconfig": { "StoreMode": "Store" },
      "memspec": {
        "memoryId": "test-hbm2",
        "memoryType": "HBM2",
        "memarchitecturespec": {
          "nbrOfChannels": 1, "nbrOfPseudoChannels": 2, "nbrOfRanks": 1,
          "nbrOfBanks": 16, "nbrOfBankGroups": 4,
          "nbrOfRows": 16384, "nbrOfColumns": 64,
          "nbrOfDevices": 1, "width": 128, "burstLength": 4, "dataRate": 2
        },
        "memtimingspec": {
          "tCK": 1000,
          "XP": 8, "XS": 272, "RAS": 28, "RC": 42, "RCDRD": 12, "RCDWR": 6,
          "RL": 14, "WL": 7, "RTP": 4, "WR": 14, "RP": 14,
          "REFI": 3900, "REFIPB": 244, "RFC": 260, "RFCPB": 160,
          "CCDS": 2, "CCDL": 4, "RRDS": 4, "RRDL": 6, "WTRS": 3, "WTRL": 9,
          "FAW": 16
        }
      },
      "addressmapping": {
        "BYTE_BIT": [0, 1, 2, 3],
        "COLUMN_BIT": [4, 5, 6, 7, 8, 9],
        "BANK_BIT": [10, 11],
        "BANKGROUP_BIT": [12, 13],
        "ROW_BIT": [14, 15, 16, 17, 18, 19, 20, 21, 22, 23, 24, 25, 26, 27]
      }
    }"#
    .to_owned()
}

/// Parses one of the JSON builders above.
pub fn config(json: &str) -> Config {
    Config::from_json(json).unwrap()
}

/// Applies a closure on top of a parsed config (policy tweaks per test).
pub fn config_with(json: &str, tweak: impl FnOnce(&mut Config)) -> Config {
    let mut cfg = config(json);
    tweak(&mut cfg);
    cfg
}

/// Builds a fully tagged transaction, bypassing the arbiter and decoder.
pub fn make_trans(
    pool: &mut TransactionPool,
    memspec: &MemSpec,
    kind: TransKind,
    bank: Bank,
    row: u64,
    column: u64,
    payload_id: u64,
) -> TransId {
    let data = if kind == TransKind::Write {
        vec![
            0;
            (memspec.burst_length as usize * memspec.bit_width as usize
                * memspec.devices_per_rank)
                / 8
        ]
    } else {
        Vec::new()
    };
    pool.insert(Transaction {
        kind,
        address: row << 16 | column << 3,
        data,
        byte_enables: None,
        arbiter: ArbiterTag {
            thread: Thread(0),
            channel: Channel(0),
            thread_payload_id: payload_id,
            time_of_generation: SimTime::ZERO,
        },
        controller: ControllerTag {
            channel_payload_id: payload_id,
            rank: bank.rank(memspec.banks_per_rank),
            bank_group: bank.group(memspec.banks_per_group),
            bank,
            row: Row(row),
            column: Column(column),
            burst_length: memspec.burst_length,
        },
    })
}

/// Builds an untagged transaction at a raw address (for driving the arbiter,
/// which assigns both tags itself).
pub fn make_addr_trans(
    pool: &mut TransactionPool,
    thread: Thread,
    kind: TransKind,
    address: u64,
) -> TransId {
    pool.insert(Transaction {
        kind,
        address,
        data: Vec::new(),
        byte_enables: None,
        arbiter: ArbiterTag {
            thread,
            channel: Channel(0),
            thread_payload_id: 0,
            time_of_generation: SimTime::ZERO,
        },
        controller: ControllerTag {
            channel_payload_id: 0,
            rank: Rank(0),
            bank_group: BankGroup(0),
            bank: Bank(0),
            row: Row::NONE,
            column: Column(0),
            burst_length: 0,
        },
    })
}

/// A miniature event loop around one controller.
///
/// Emulates the arbiter side of the handshake: BEGIN_REQs are serialized (the
/// next goes out only after the previous END_REQ), and every BEGIN_RESP is
/// acknowledged one cycle later.
pub struct Bench {
    /// The controller under test (channel 0).
    pub controller: Controller,
    /// Pool holding the bench's transactions.
    pub pool: TransactionPool,
    /// The memspec in force.
    pub memspec: Arc<MemSpec>,
    /// Every command committed, in issue order.
    pub log: Vec<CommandRecord>,
    /// END_REQ times per transaction, in arrival order.
    pub acks: Vec<(TransId, SimTime)>,
    /// BEGIN_RESP times per transaction.
    pub responses: Vec<(TransId, SimTime)>,
    times: BTreeSet<SimTime>,
    pending: VecDeque<TransId>,
    req_in_flight: bool,
}

impl Bench {
    /// Builds the bench from a config bundle.
    pub fn new(cfg: &Config) -> Self {
        let memspec = Arc::new(MemSpec::from_config(&cfg.memspec).unwrap());
        let controller = Controller::new(&cfg.mc, Arc::clone(&memspec), Channel(0)).unwrap();
        Self {
            controller,
            pool: TransactionPool::new(),
            memspec,
            log: Vec::new(),
            acks: Vec::new(),
            responses: Vec::new(),
            times: BTreeSet::new(),
            pending: VecDeque::new(),
            req_in_flight: false,
        }
    }

    /// Queues a request for delivery through the serialized handshake.
    pub fn submit(
        &mut self,
        kind: TransKind,
        bank: Bank,
        row: u64,
        column: u64,
    ) -> TransId {
        let payload_id = (self.pending.len() + self.acks.len() + usize::from(self.req_in_flight))
            as u64;
        let id = make_trans(
            &mut self.pool,
            &self.memspec,
            kind,
            bank,
            row,
            column,
            payload_id,
        );
        self.pending.push_back(id);
        let _ = self.times.insert(SimTime::ZERO);
        id
    }

    /// Drives the controller's wake-up chain up to and including `limit`.
    pub fn run_to(&mut self, limit: SimTime) {
        self.kick(SimTime::ZERO);
        let _ = self.times.insert(SimTime::ZERO);
        while let Some(&now) = self.times.iter().next() {
            let _ = self.times.remove(&now);
            if now > limit {
                break;
            }
            let out = self.controller.controller_method(now, &mut self.pool);
            self.log.extend(out.commands.iter().copied());
            for (id, phase) in out.upstream {
                match phase {
                    UpstreamPhase::EndReq => {
                        self.acks.push((id, now));
                        self.req_in_flight = false;
                        self.kick(now);
                    }
                    UpstreamPhase::BeginResp => {
                        self.responses.push((id, now));
                        let fire = self.controller.end_resp(now);
                        let _ = self.times.insert(fire);
                    }
                }
            }
            if let Some(wake) = out.wake_at {
                if wake > now {
                    let _ = self.times.insert(wake);
                }
            }
        }
    }

    /// Issue times of every command of one kind.
    pub fn times_of(&self, command: dramsim_core::controller::command::Command) -> Vec<SimTime> {
        self.log
            .iter()
            .filter(|r| r.command == command)
            .map(|r| r.time)
            .collect()
    }

    fn kick(&mut self, now: SimTime) {
        if !self.req_in_flight {
            if let Some(id) = self.pending.pop_front() {
                let fire = self.controller.begin_req(id, now);
                self.req_in_flight = true;
                let _ = self.times.insert(fire);
            }
        }
    }
}

/// One clock cycle of the given memspec.
pub fn cycles(memspec: &MemSpec, n: u64) -> SimTime {
    memspec.tck.times(n)
}
