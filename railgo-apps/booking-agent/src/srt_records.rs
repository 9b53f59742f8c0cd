//!  Railgo Booking Agent
//!
//!  Copyright (C) 2026  Railgo Contributors
//!
//!  This program is free software: you can redistribute it and/or modify
//!  it under the terms of the GNU Affero General Public License as published by
//!  the Free Software Foundation, either version 3 of the License, or
//!  (at your option) any later version.
//!
//!  This program is distributed in the hope that it will be useful,
//!  but WITHOUT ANY WARRANTY; without even the implied warranty of
//!  MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
//!  GNU Affero General Public License for more details.
//!
//!  You should have received a copy of the GNU Affero General Public License
//!  along with this program.  If not, see <http://www.gnu.org/licenses/>.

//! # SRT Response Decoding
//!
//! Side-effect free decoding of SRT envelopes and record mapping into the
//! shared entities. The envelope is `resultMap[0]` with a `strResult`
//! SUCC/FAIL flag; failures carry a human-readable `msgTxt` and sometimes a
//! `msgCd`, and are classified by message content (the mobile endpoints
//! report no stable machine code for the interesting cases).

use serde_json::Value;

use crate::backend::{Reservation, Session, Ticket};
use crate::errors::RailError;
use crate::schedule::{Schedule, SeatState, StandbyState};
use crate::station::StationDirectory;

/// Marker the seat-state strings carry when a class is on open sale.
const AVAILABLE_MARKER: &str = "예약가능";

// Failure-message fragments the mobile app itself matches on.
const MSG_SOLD_OUT: [&str; 2] = ["잔여석", "매진"];
const MSG_DUPLICATE: &str = "중복";
const MSG_NOT_LOGGED_IN: &str = "로그인";
const MSG_NO_RESULTS: &str = "조회 결과가 없";

const MSG_UNKNOWN_MEMBER: &str = "존재하지않는 회원";
const MSG_BAD_PASSWORD: &str = "비밀번호 오류";
const MSG_IP_BLOCKED: &str = "Your IP Address Blocked";

pub fn train_class_name(code: &str) -> &'static str {
    match code {
        "00" => "KTX",
        "02" => "Mugunghwa",
        "03" => "Commuter",
        "04" => "Nuriro",
        "05" => "All",
        "07" | "10" => "KTX-Sancheon",
        "08" => "ITX-Saemaeul",
        "09" => "ITX-Cheongchun",
        "17" => "SRT",
        "18" => "ITX-Maum",
        _ => "Train",
    }
}

/// The train-class code this backend's own runs carry; search responses
/// interleave partner-operator runs that cannot be reserved here.
pub const OWN_TRAIN_CLASS: &str = "17";

pub fn discount_name(code: &str) -> &'static str {
    match code {
        "000" => "adult/teen",
        "101" => "flexible fare discount",
        "105" => "free seating discount",
        "106" => "standing discount",
        "107" => "rear-facing seat discount",
        "108" => "door-side seat discount",
        "109" => "family seat conversion discount",
        "111" | "112" => "route-specific fare",
        "113" | "114" => "rate discount",
        "121" => "airport connection fare",
        "131" | "132" | "133" => "special discount",
        "191" => "calling-station discount",
        "192" => "media discount",
        "201" => "child",
        "202" => "accompanied infant discount",
        "204" => "senior",
        "205" => "disability 1-3",
        "206" => "disability 4-6",
        _ => "other discount",
    }
}

/// String field access tolerant of the backend's habit of emitting numbers
/// for numeric-looking fields.
fn text(record: &Value, key: &str) -> String {
    match record.get(key) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        _ => String::new(),
    }
}

fn required(record: &Value, key: &str) -> Result<String, RailError> {
    let value = text(record, key);
    if value.is_empty() {
        Err(RailError::Protocol(format!("record missing field {key:?}")))
    } else {
        Ok(value)
    }
}

fn number(record: &Value, key: &str) -> i64 {
    match record.get(key) {
        Some(Value::Number(n)) => n.as_i64().unwrap_or_default(),
        Some(Value::String(s)) => s.trim().parse().unwrap_or_default(),
        _ => 0,
    }
}

/// Decoded generic success/fail wrapper.
#[derive(Debug, Clone)]
pub struct SrtEnvelope {
    root: Value,
    status: Value,
}

impl SrtEnvelope {
    pub fn parse(body: &str) -> Result<Self, RailError> {
        let root: Value = serde_json::from_str(body)
            .map_err(|e| RailError::Protocol(format!("envelope is not JSON: {e}")))?;

        if let Some(result_map) = root.get("resultMap").and_then(Value::as_array) {
            let status = result_map
                .first()
                .cloned()
                .ok_or_else(|| RailError::Protocol("resultMap is empty".into()))?;
            return Ok(SrtEnvelope { root, status });
        }

        match (root.get("ErrorCode"), root.get("ErrorMsg")) {
            (Some(code), Some(msg)) => Err(RailError::backend(
                code.as_str().unwrap_or_default(),
                msg.as_str().unwrap_or_default(),
            )),
            _ => Err(RailError::Protocol(format!(
                "envelope missing resultMap: {}",
                body.chars().take(200).collect::<String>()
            ))),
        }
    }

    pub fn root(&self) -> &Value {
        &self.root
    }

    pub fn message(&self) -> String {
        text(&self.status, "msgTxt")
    }

    pub fn code(&self) -> String {
        text(&self.status, "msgCd")
    }

    fn success(&self) -> Result<bool, RailError> {
        match text(&self.status, "strResult").as_str() {
            "SUCC" => Ok(true),
            "FAIL" => Ok(false),
            "" => Err(RailError::Protocol("envelope missing result flag".into())),
            other => Err(RailError::Protocol(format!(
                "unknown result flag {other:?}"
            ))),
        }
    }

    /// Classify a failed envelope into the taxonomy the watcher consumes.
    pub fn ensure_success(&self) -> Result<(), RailError> {
        if self.success()? {
            return Ok(());
        }
        let message = self.message();
        if MSG_SOLD_OUT.iter().any(|m| message.contains(m)) {
            return Err(RailError::SoldOut);
        }
        if message.contains(MSG_NO_RESULTS) {
            return Err(RailError::NoResults);
        }
        if message.contains(MSG_DUPLICATE) {
            return Err(RailError::Duplicate(message));
        }
        if message.contains(MSG_NOT_LOGGED_IN) {
            return Err(RailError::NotLoggedIn);
        }
        let code = self.code();
        Err(RailError::backend(
            if code.is_empty() { "FAIL".into() } else { code },
            message,
        ))
    }
}

/// Decode the login response, which does not use the generic envelope.
pub fn parse_login(body: &str) -> Result<Session, RailError> {
    if body.contains(MSG_IP_BLOCKED) {
        return Err(RailError::Auth(body.trim().to_string()));
    }

    let root: Value = serde_json::from_str(body)
        .map_err(|e| RailError::Protocol(format!("login reply is not JSON: {e}")))?;

    if body.contains(MSG_UNKNOWN_MEMBER) || body.contains(MSG_BAD_PASSWORD) {
        let message = root
            .get("MSG")
            .and_then(Value::as_str)
            .unwrap_or("login rejected")
            .to_string();
        return Err(RailError::Auth(message));
    }

    let user = root
        .get("userMap")
        .ok_or_else(|| RailError::Protocol("login reply missing member data".into()))?;

    Ok(Session {
        membership_number: required(user, "MB_CRD_NO")?,
        name: required(user, "CUST_NM")?,
        phone_number: text(user, "MBL_PHONE"),
        email: None,
    })
}

/// Map one search record into a schedule snapshot.
pub fn map_schedule(record: &Value, stations: &StationDirectory) -> Result<Schedule, RailError> {
    let seat_state = |key: &str| {
        if text(record, key).contains(AVAILABLE_MARKER) {
            SeatState::Available
        } else {
            SeatState::Unavailable
        }
    };

    let class_code = required(record, "stlbTrnClsfCd")?;
    let dep_code = required(record, "dptRsStnCd")?;
    let arr_code = required(record, "arvRsStnCd")?;
    let dep_date = required(record, "dptDt")?;
    let standby_code = text(record, "rsvWaitPsbCd")
        .parse::<i32>()
        .unwrap_or(-1);

    Ok(Schedule {
        train_class_name: train_class_name(&class_code).to_string(),
        train_class_code: class_code,
        train_number: required(record, "trnNo")?,
        dep_station_name: stations.name_of(&dep_code),
        dep_station_code: dep_code,
        dep_time: required(record, "dptTm")?,
        arr_station_name: stations.name_of(&arr_code),
        arr_station_code: arr_code,
        arr_time: required(record, "arvTm")?,
        run_date: dep_date.clone(),
        dep_date,
        dep_run_order: text(record, "dptStnRunOrdr"),
        dep_cons_order: text(record, "dptStnConsOrdr"),
        arr_run_order: text(record, "arvStnRunOrdr"),
        arr_cons_order: text(record, "arvStnConsOrdr"),
        general_seat: seat_state("gnrmRsvPsbStr"),
        special_seat: seat_state("sprmRsvPsbStr"),
        standby: StandbyState(standby_code),
    })
}

/// Extract the schedule records from a search envelope and keep only this
/// backend's own runs.
pub fn schedules_from(
    envelope: &SrtEnvelope,
    stations: &StationDirectory,
) -> Result<Vec<Schedule>, RailError> {
    let records = envelope
        .root()
        .pointer("/outDataSets/dsOutput1")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();

    records
        .iter()
        .filter(|r| text(r, "stlbTrnClsfCd") == OWN_TRAIN_CLASS)
        .map(|r| map_schedule(r, stations))
        .collect()
}

/// The reservation number a successful reserve write reports.
pub fn reservation_number_from(envelope: &SrtEnvelope) -> Result<String, RailError> {
    envelope
        .root()
        .pointer("/reservListMap/0/pnrNo")
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| RailError::Protocol("reserve reply missing reservation number".into()))
}

/// Map one ticket record from the ticket-info response.
pub fn map_ticket(record: &Value, reservation_number: &str) -> Ticket {
    let seat = text(record, "seatNo");
    let discount_code = text(record, "dcntKndCd");
    Ticket {
        reservation_number: reservation_number.to_string(),
        car: text(record, "scarNo"),
        waiting: seat.is_empty(),
        seat,
        seat_class_code: text(record, "psrmClCd"),
        discount_name: discount_name(&discount_code).to_string(),
        discount_code,
        price: number(record, "rcvdAmt"),
        original_price: number(record, "stdrPrc"),
        discount_amount: number(record, "dcntPrc"),
        train_number: None,
        refund_keys: None,
    }
}

pub fn tickets_from(envelope: &SrtEnvelope, reservation_number: &str) -> Vec<Ticket> {
    envelope
        .root()
        .get("trainListMap")
        .and_then(Value::as_array)
        .map(|records| {
            records
                .iter()
                .map(|r| map_ticket(r, reservation_number))
                .collect()
        })
        .unwrap_or_default()
}

/// Map one (train, pay) record pair from the reservation list.
pub fn map_reservation(
    train: &Value,
    pay: &Value,
    tickets: Vec<Ticket>,
) -> Result<Reservation, RailError> {
    let class_code = required(pay, "stlbTrnClsfCd")?;
    let seat_count = {
        let spec = number(train, "tkSpecNum");
        if spec > 0 {
            spec
        } else {
            number(train, "seatNum")
        }
    };
    let paid = text(pay, "stlFlg") == "Y";
    let due_date = text(pay, "iseLmtDt");
    let due_time = text(pay, "iseLmtTm");
    let waiting = !paid && due_date.is_empty() && due_time.is_empty();

    Ok(Reservation {
        reservation_number: required(train, "pnrNo")?,
        total_price: number(train, "rcvdAmt"),
        seat_count: seat_count.max(0) as u32,
        train_class_name: train_class_name(&class_code).to_string(),
        train_class_code: class_code,
        train_number: text(pay, "trnNo"),
        dep_date: text(pay, "dptDt"),
        dep_time: text(pay, "dptTm"),
        dep_station_code: text(pay, "dptRsStnCd"),
        dep_station_name: String::new(),
        arr_time: text(pay, "arvTm"),
        arr_station_code: text(pay, "arvRsStnCd"),
        arr_station_name: String::new(),
        payment_due_date: due_date,
        payment_due_time: due_time,
        paid,
        waiting,
        journey_number: "001".into(),
        journey_count: "01".into(),
        change_number: "00000".into(),
        sales_window: None,
        tickets,
    })
}

/// Pair the parallel train/pay arrays of the reservation-list response.
pub fn reservation_pairs(envelope: &SrtEnvelope) -> Vec<(Value, Value)> {
    let trains = envelope
        .root()
        .get("trainListMap")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();
    let pays = envelope
        .root()
        .get("payListMap")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();
    trains.into_iter().zip(pays).collect()
}

/// Decode the payment response, which reports its result in a dataset row
/// instead of the generic envelope.
pub fn pay_result(body: &str) -> Result<bool, RailError> {
    let root: Value = serde_json::from_str(body)
        .map_err(|e| RailError::Protocol(format!("payment reply is not JSON: {e}")))?;
    let row = root
        .pointer("/outDataSets/dsOutput0/0")
        .ok_or_else(|| RailError::Protocol("payment reply missing result row".into()))?;
    if text(row, "strResult") == "FAIL" {
        return Err(RailError::backend(text(row, "msgCd"), text(row, "msgTxt")));
    }
    Ok(true)
}

/// Decode the reservation-info lookup used before a refund. This endpoint
/// predates the generic envelope and reports errors as ErrorCode/ErrorMsg.
pub fn refund_source_from(body: &str) -> Result<Value, RailError> {
    let root: Value = serde_json::from_str(body)
        .map_err(|e| RailError::Protocol(format!("reservation info is not JSON: {e}")))?;
    let ok = root.get("ErrorCode").and_then(Value::as_str) == Some("0")
        && root.get("ErrorMsg").and_then(Value::as_str) == Some("");
    if !ok {
        return Err(RailError::backend(
            root.get("ErrorCode")
                .and_then(Value::as_str)
                .unwrap_or_default(),
            root.get("ErrorMsg")
                .and_then(Value::as_str)
                .unwrap_or_default(),
        ));
    }
    root.pointer("/outDataSets/dsOutput1/0")
        .cloned()
        .ok_or_else(|| RailError::Protocol("reservation info missing sale record".into()))
}

/// Sale identifiers the refund write echoes back.
#[derive(Debug, Clone)]
pub struct RefundSource {
    pub reservation_number: String,
    pub sale_date: String,
    pub sale_window: String,
    pub sale_sequence: String,
    pub return_password: String,
    pub buyer_name: String,
}

pub fn refund_fields(info: &Value) -> Result<RefundSource, RailError> {
    Ok(RefundSource {
        reservation_number: required(info, "pnrNo")?,
        sale_date: text(info, "ogtkSaleDt"),
        sale_window: text(info, "ogtkSaleWctNo"),
        sale_sequence: text(info, "ogtkSaleSqno"),
        return_password: text(info, "ogtkRetPwd"),
        buyer_name: text(info, "buyPsNm"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn envelope(result: &str, msg: &str, code: &str) -> SrtEnvelope {
        let body = json!({
            "resultMap": [{ "strResult": result, "msgTxt": msg, "msgCd": code }]
        })
        .to_string();
        SrtEnvelope::parse(&body).expect("parses")
    }

    #[test]
    fn success_envelope_passes() {
        assert!(envelope("SUCC", "", "").ensure_success().is_ok());
    }

    #[test]
    fn sold_out_message_classifies() {
        let err = envelope("FAIL", "잔여석이 없습니다.", "ERR1").ensure_success();
        assert!(matches!(err, Err(RailError::SoldOut)));
    }

    #[test]
    fn no_results_message_classifies() {
        let err = envelope("FAIL", "조회 결과가 없습니다.", "").ensure_success();
        assert!(matches!(err, Err(RailError::NoResults)));
    }

    #[test]
    fn duplicate_message_classifies() {
        let err = envelope("FAIL", "중복된 예약이 있습니다.", "").ensure_success();
        assert!(matches!(err, Err(RailError::Duplicate(_))));
    }

    #[test]
    fn login_required_message_classifies() {
        let err = envelope("FAIL", "로그인 후 이용하시기 바랍니다.", "").ensure_success();
        assert!(matches!(err, Err(RailError::NotLoggedIn)));
    }

    #[test]
    fn unknown_failure_keeps_code_and_message() {
        let err = envelope("FAIL", "시스템 점검 중입니다.", "S001").ensure_success();
        match err {
            Err(RailError::Backend { code, message }) => {
                assert_eq!(code, "S001");
                assert!(message.contains("점검"));
            }
            other => panic!("expected backend error, got {other:?}"),
        }
    }

    #[test]
    fn error_code_reply_surfaces_as_backend_error() {
        let body = json!({ "ErrorCode": "9999", "ErrorMsg": "maintenance" }).to_string();
        assert!(matches!(
            SrtEnvelope::parse(&body),
            Err(RailError::Backend { .. })
        ));
    }

    #[test]
    fn login_reply_parses_member_fields() {
        let body = json!({
            "userMap": {
                "MB_CRD_NO": "1234567890",
                "CUST_NM": "KIM",
                "MBL_PHONE": "01012345678"
            }
        })
        .to_string();
        let session = parse_login(&body).expect("parses");
        assert_eq!(session.membership_number, "1234567890");
        assert_eq!(session.name, "KIM");
        assert_eq!(session.phone_number, "01012345678");
    }

    #[test]
    fn login_rejection_preserves_backend_message() {
        let body = json!({
            "MSG": "존재하지않는 회원입니다.",
        })
        .to_string();
        match parse_login(&body) {
            Err(RailError::Auth(msg)) => assert!(msg.contains("회원")),
            other => panic!("expected auth error, got {other:?}"),
        }
    }

    #[test]
    fn schedule_record_maps_states_and_standby() {
        let record = json!({
            "stlbTrnClsfCd": "17",
            "trnNo": "0301",
            "dptDt": "20260815",
            "dptTm": "080000",
            "dptRsStnCd": "0551",
            "dptStnRunOrdr": "1",
            "dptStnConsOrdr": "2",
            "arvDt": "20260815",
            "arvTm": "103000",
            "arvRsStnCd": "0020",
            "arvStnRunOrdr": "9",
            "arvStnConsOrdr": "8",
            "gnrmRsvPsbStr": "예약가능",
            "sprmRsvPsbStr": "매진",
            "rsvWaitPsbCdNm": "-",
            "rsvWaitPsbCd": "9"
        });
        let schedule =
            map_schedule(&record, &StationDirectory::default()).expect("maps");
        assert_eq!(schedule.train_class_name, "SRT");
        assert!(schedule.general_seat_available());
        assert!(!schedule.special_seat_available());
        assert!(schedule.standby_available());
        assert_eq!(schedule.dep_station_name, "0551");
    }

    #[test]
    fn search_envelope_keeps_own_runs_only() {
        let body = json!({
            "resultMap": [{ "strResult": "SUCC" }],
            "outDataSets": { "dsOutput1": [
                { "stlbTrnClsfCd": "17", "trnNo": "0301", "dptDt": "20260815",
                  "dptTm": "080000", "dptRsStnCd": "0551", "arvTm": "103000",
                  "arvRsStnCd": "0020", "gnrmRsvPsbStr": "예약가능",
                  "sprmRsvPsbStr": "예약가능", "rsvWaitPsbCd": "-1" },
                { "stlbTrnClsfCd": "00", "trnNo": "0101", "dptDt": "20260815",
                  "dptTm": "081500", "dptRsStnCd": "0551", "arvTm": "104500",
                  "arvRsStnCd": "0020", "gnrmRsvPsbStr": "예약가능",
                  "sprmRsvPsbStr": "매진", "rsvWaitPsbCd": "-1" }
            ]}
        })
        .to_string();
        let envelope = SrtEnvelope::parse(&body).expect("parses");
        let schedules =
            schedules_from(&envelope, &StationDirectory::default()).expect("maps");
        assert_eq!(schedules.len(), 1);
        assert_eq!(schedules[0].train_number, "0301");
    }

    #[test]
    fn reservation_pairs_zip_and_map() {
        let body = json!({
            "resultMap": [{ "strResult": "SUCC" }],
            "trainListMap": [
                { "pnrNo": "000012345", "rcvdAmt": "52400", "tkSpecNum": "2" }
            ],
            "payListMap": [
                { "stlbTrnClsfCd": "17", "trnNo": "0301", "dptDt": "20260815",
                  "dptTm": "080000", "dptRsStnCd": "0551", "arvTm": "103000",
                  "arvRsStnCd": "0020", "iseLmtDt": "20260810",
                  "iseLmtTm": "235900", "stlFlg": "N" }
            ]
        })
        .to_string();
        let envelope = SrtEnvelope::parse(&body).expect("parses");
        let pairs = reservation_pairs(&envelope);
        assert_eq!(pairs.len(), 1);
        let reservation =
            map_reservation(&pairs[0].0, &pairs[0].1, Vec::new()).expect("maps");
        assert_eq!(reservation.reservation_number, "000012345");
        assert_eq!(reservation.total_price, 52_400);
        assert_eq!(reservation.seat_count, 2);
        assert!(!reservation.paid);
        assert!(!reservation.waiting);
    }

    #[test]
    fn missing_due_date_marks_standby() {
        let train = json!({ "pnrNo": "000012345", "rcvdAmt": 0, "seatNum": "1" });
        let pay = json!({ "stlbTrnClsfCd": "17", "stlFlg": "N" });
        let reservation = map_reservation(&train, &pay, Vec::new()).expect("maps");
        assert!(reservation.waiting);
    }

    #[test]
    fn waiting_ticket_has_empty_seat() {
        let record = json!({
            "scarNo": "", "seatNo": "", "psrmClCd": "1",
            "dcntKndCd": "000", "rcvdAmt": "52400", "stdrPrc": "52400",
            "dcntPrc": "0"
        });
        let ticket = map_ticket(&record, "000012345");
        assert!(ticket.waiting);
        assert_eq!(ticket.discount_name, "adult/teen");
    }
}
