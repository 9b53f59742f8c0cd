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

//! # Korail Response Decoding
//!
//! Side-effect free decoding of Korail envelopes and record mapping. Unlike
//! its sibling, this backend reports failures with stable machine codes, so
//! classification is a static code table rather than message matching.

use serde_json::Value;

use crate::backend::{RefundKeys, Reservation, Session, Ticket};
use crate::errors::RailError;
use crate::schedule::{Schedule, SeatState, StandbyState};

/// Seat-state flag value meaning "on open sale".
const SEAT_ON_SALE: &str = "11";

// The static code -> kind table.
const CODES_NOT_LOGGED_IN: [&str; 1] = ["P058"];
const CODES_NO_RESULTS: [&str; 4] = ["P100", "WRG000000", "WRD000061", "WRT300005"];
const CODES_SOLD_OUT: [&str; 2] = ["IRT010110", "ERR211161"];

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

pub fn parse_root(body: &str) -> Result<Value, RailError> {
    serde_json::from_str(body)
        .map_err(|e| RailError::Protocol(format!("reply is not JSON: {e}")))
}

/// Map a failure code through the static table.
pub fn classify_code(code: &str, message: &str) -> RailError {
    if CODES_NOT_LOGGED_IN.contains(&code) {
        RailError::NotLoggedIn
    } else if CODES_NO_RESULTS.contains(&code) {
        RailError::NoResults
    } else if CODES_SOLD_OUT.contains(&code) {
        RailError::SoldOut
    } else {
        RailError::backend(code, message)
    }
}

/// Check the result flag of a decoded reply and classify failures.
pub fn check_result(root: &Value) -> Result<(), RailError> {
    match root.get("strResult").and_then(Value::as_str) {
        Some("FAIL") => {
            let code = text(root, "h_msg_cd");
            let message = text(root, "h_msg_txt");
            Err(classify_code(&code, &message))
        }
        Some(_) => Ok(()),
        None => Err(RailError::Protocol("reply missing result flag".into())),
    }
}

/// Decode the pre-login key handshake: the AES key and its server-side
/// index the login form must echo back.
pub fn parse_cipher_key(body: &str) -> Result<(String, String), RailError> {
    let root = parse_root(body)?;
    let ok = root.get("strResult").and_then(Value::as_str) == Some("SUCC");
    let entry = root.get("app.login.cphd");
    match (ok, entry) {
        (true, Some(entry)) => {
            let idx = required(entry, "idx")
                .map_err(|_| RailError::Codec("handshake reply missing key index".into()))?;
            let key = required(entry, "key")
                .map_err(|_| RailError::Codec("handshake reply missing key".into()))?;
            Ok((idx, key))
        }
        _ => Err(RailError::Codec(
            "key handshake did not return a usable key".into(),
        )),
    }
}

pub fn parse_login(body: &str) -> Result<Session, RailError> {
    let root = parse_root(body)?;
    let succeeded = root.get("strResult").and_then(Value::as_str) == Some("SUCC")
        && !text(&root, "strMbCrdNo").is_empty();
    if !succeeded {
        let message = {
            let m = text(&root, "h_msg_txt");
            if m.is_empty() { "login rejected".to_string() } else { m }
        };
        return Err(RailError::Auth(message));
    }
    Ok(Session {
        membership_number: text(&root, "strMbCrdNo"),
        name: text(&root, "strCustNm"),
        phone_number: text(&root, "strCpNo"),
        email: {
            let e = text(&root, "strEmailAdr");
            if e.is_empty() { None } else { Some(e) }
        },
    })
}

pub fn map_schedule(record: &Value) -> Result<Schedule, RailError> {
    let standby_code = text(record, "h_wait_rsv_flg").parse::<i32>().unwrap_or(-1);
    let seat_state = |key: &str| {
        if text(record, key) == SEAT_ON_SALE {
            SeatState::Available
        } else {
            SeatState::Unavailable
        }
    };

    Ok(Schedule {
        train_class_code: required(record, "h_trn_clsf_cd")?,
        train_class_name: text(record, "h_trn_clsf_nm"),
        train_number: required(record, "h_trn_no")?,
        dep_station_code: text(record, "h_dpt_rs_stn_cd"),
        dep_station_name: text(record, "h_dpt_rs_stn_nm"),
        dep_date: required(record, "h_dpt_dt")?,
        dep_time: required(record, "h_dpt_tm")?,
        arr_station_code: text(record, "h_arv_rs_stn_cd"),
        arr_station_name: text(record, "h_arv_rs_stn_nm"),
        arr_time: text(record, "h_arv_tm"),
        run_date: text(record, "h_run_dt"),
        dep_run_order: String::new(),
        dep_cons_order: String::new(),
        arr_run_order: String::new(),
        arr_cons_order: String::new(),
        general_seat: seat_state("h_gen_rsv_cd"),
        special_seat: seat_state("h_spe_rsv_cd"),
        standby: StandbyState(standby_code),
    })
}

pub fn schedules_from(root: &Value) -> Result<Vec<Schedule>, RailError> {
    root.pointer("/trn_infos/trn_info")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default()
        .iter()
        .map(map_schedule)
        .collect()
}

/// The reservation id and sales-window id a reserve write reports.
pub fn reserve_reply(root: &Value) -> Result<(String, Option<String>), RailError> {
    let id = required(root, "h_pnr_no")
        .map_err(|_| RailError::Protocol("reserve reply missing reservation number".into()))?;
    let window = {
        let w = text(root, "h_wct_no");
        if w.is_empty() { None } else { Some(w) }
    };
    Ok((id, window))
}

/// The sentinel values marking a standby reservation with no payment window.
fn is_waiting(due_date: &str, due_time: &str) -> bool {
    due_date == "00000000" || due_time == "235959"
}

pub fn map_reservation(record: &Value) -> Result<Reservation, RailError> {
    let due_date = text(record, "h_ntisu_lmt_dt");
    let due_time = text(record, "h_ntisu_lmt_tm");
    let run_date = text(record, "h_run_dt");
    Ok(Reservation {
        reservation_number: required(record, "h_pnr_no")?,
        total_price: number(record, "h_rsv_amt"),
        seat_count: number(record, "h_tot_seat_cnt").max(0) as u32,
        train_class_code: text(record, "h_trn_clsf_cd"),
        train_class_name: text(record, "h_trn_clsf_nm"),
        train_number: text(record, "h_trn_no"),
        dep_date: run_date.clone(),
        dep_time: text(record, "h_dpt_tm"),
        dep_station_code: text(record, "h_dpt_rs_stn_cd"),
        dep_station_name: text(record, "h_dpt_rs_stn_nm"),
        arr_time: text(record, "h_arv_tm"),
        arr_station_code: text(record, "h_arv_rs_stn_cd"),
        arr_station_name: text(record, "h_arv_rs_stn_nm"),
        waiting: is_waiting(&due_date, &due_time),
        payment_due_date: due_date,
        payment_due_time: due_time,
        paid: false,
        journey_number: {
            let j = text(record, "txtJrnySqno");
            if j.is_empty() { "001".into() } else { j }
        },
        journey_count: {
            let j = text(record, "txtJrnyCnt");
            if j.is_empty() { "01".into() } else { j }
        },
        change_number: {
            let c = text(record, "hidRsvChgNo");
            if c.is_empty() { "00000".into() } else { c }
        },
        sales_window: None,
        tickets: Vec::new(),
    })
}

/// Flatten the journey/train nesting of the reservation-list reply.
pub fn reservations_from(root: &Value) -> Result<Vec<Reservation>, RailError> {
    let journeys = root
        .pointer("/jrny_infos/jrny_info")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();
    let mut reservations = Vec::new();
    for journey in &journeys {
        let trains = journey
            .pointer("/train_infos/train_info")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();
        for train in &trains {
            reservations.push(map_reservation(train)?);
        }
    }
    Ok(reservations)
}

/// Map one issued-ticket record from the ticket list.
pub fn map_ticket(record: &Value) -> Result<Ticket, RailError> {
    let raw = record
        .pointer("/ticket_list/0/train_info/0")
        .ok_or_else(|| RailError::Protocol("ticket record missing train info".into()))?;
    let seat = text(raw, "h_seat_no");
    Ok(Ticket {
        reservation_number: text(raw, "h_pnr_no"),
        car: text(raw, "h_srcar_no"),
        waiting: seat.is_empty(),
        seat,
        seat_class_code: text(raw, "h_psrm_cl_cd"),
        discount_code: String::new(),
        discount_name: String::new(),
        price: number(raw, "h_rcvd_amt"),
        original_price: number(raw, "h_rcvd_amt"),
        discount_amount: 0,
        train_number: Some(text(raw, "h_trn_no")),
        refund_keys: Some(RefundKeys {
            sale_window: text(raw, "h_orgtk_wct_no"),
            sale_date: text(raw, "h_orgtk_ret_sale_dt"),
            sale_sequence: text(raw, "h_orgtk_sale_sqno"),
            return_password: text(raw, "h_orgtk_ret_pwd"),
        }),
    })
}

pub fn tickets_from(root: &Value) -> Result<Vec<Ticket>, RailError> {
    root.get("reservation_list")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default()
        .iter()
        .map(map_ticket)
        .collect()
}

/// Seat id from the per-ticket seat lookup.
pub fn seat_from(root: &Value) -> Option<String> {
    root.pointer("/ticket_infos/ticket_info/0/tk_seat_info/0")
        .map(|seat| text(seat, "h_seat_no"))
        .filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn code_table_classifies_known_codes() {
        assert!(matches!(
            classify_code("P058", "Need To Login"),
            RailError::NotLoggedIn
        ));
        for code in CODES_NO_RESULTS {
            assert!(matches!(classify_code(code, ""), RailError::NoResults));
        }
        for code in CODES_SOLD_OUT {
            assert!(matches!(classify_code(code, ""), RailError::SoldOut));
        }
    }

    #[test]
    fn unknown_codes_surface_as_backend_errors() {
        match classify_code("X999", "strange failure") {
            RailError::Backend { code, message } => {
                assert_eq!(code, "X999");
                assert_eq!(message, "strange failure");
            }
            other => panic!("expected backend error, got {other:?}"),
        }
    }

    #[test]
    fn check_result_passes_success() {
        let root = json!({ "strResult": "SUCC" });
        assert!(check_result(&root).is_ok());
    }

    #[test]
    fn check_result_classifies_failure() {
        let root = json!({ "strResult": "FAIL", "h_msg_cd": "P100", "h_msg_txt": "-" });
        assert!(matches!(check_result(&root), Err(RailError::NoResults)));
    }

    #[test]
    fn cipher_key_handshake_happy_path() {
        let body = json!({
            "strResult": "SUCC",
            "app.login.cphd": { "idx": "7", "key": "korail1234567890" }
        })
        .to_string();
        let (idx, key) = parse_cipher_key(&body).expect("parses");
        assert_eq!(idx, "7");
        assert_eq!(key.len(), 16);
    }

    #[test]
    fn cipher_key_handshake_failure_is_codec_error() {
        let body = json!({ "strResult": "FAIL" }).to_string();
        assert!(matches!(
            parse_cipher_key(&body),
            Err(RailError::Codec(_))
        ));
    }

    #[test]
    fn login_reply_parses_member_fields() {
        let body = json!({
            "strResult": "SUCC",
            "strMbCrdNo": "987654",
            "strCustNm": "LEE",
            "strEmailAdr": "lee@example.com",
            "strCpNo": "01098765432"
        })
        .to_string();
        let session = parse_login(&body).expect("parses");
        assert_eq!(session.membership_number, "987654");
        assert_eq!(session.email.as_deref(), Some("lee@example.com"));
    }

    #[test]
    fn login_without_member_number_is_rejected() {
        let body = json!({ "strResult": "SUCC" }).to_string();
        assert!(matches!(parse_login(&body), Err(RailError::Auth(_))));
    }

    #[test]
    fn schedule_record_maps_seat_codes() {
        let record = json!({
            "h_trn_clsf_cd": "100",
            "h_trn_clsf_nm": "KTX",
            "h_trn_no": "0101",
            "h_dpt_rs_stn_cd": "0001",
            "h_dpt_rs_stn_nm": "서울",
            "h_dpt_dt": "20260815",
            "h_dpt_tm": "080000",
            "h_arv_rs_stn_cd": "0020",
            "h_arv_rs_stn_nm": "부산",
            "h_arv_tm": "104500",
            "h_run_dt": "20260815",
            "h_gen_rsv_cd": "11",
            "h_spe_rsv_cd": "13",
            "h_wait_rsv_flg": "9"
        });
        let schedule = map_schedule(&record).expect("maps");
        assert!(schedule.general_seat_available());
        assert!(!schedule.special_seat_available());
        assert!(schedule.standby_available());
        assert_eq!(schedule.train_class_name, "KTX");
    }

    #[test]
    fn standby_sentinels_mark_waiting_reservations() {
        let record = json!({
            "h_pnr_no": "000055555",
            "h_tot_seat_cnt": "1",
            "h_ntisu_lmt_dt": "00000000",
            "h_ntisu_lmt_tm": "235959",
            "h_rsv_amt": "48800",
            "h_run_dt": "20260815"
        });
        let reservation = map_reservation(&record).expect("maps");
        assert!(reservation.waiting);
        assert_eq!(reservation.journey_number, "001");
    }

    #[test]
    fn ticket_record_collects_refund_keys() {
        let record = json!({
            "ticket_list": [{ "train_info": [{
                "h_pnr_no": "000077777",
                "h_srcar_no": "3",
                "h_seat_no": "5A",
                "h_trn_no": "0101",
                "h_rcvd_amt": "59800",
                "h_orgtk_wct_no": "09991",
                "h_orgtk_ret_sale_dt": "20260801",
                "h_orgtk_sale_sqno": "00123",
                "h_orgtk_ret_pwd": "1234"
            }]}]
        });
        let ticket = map_ticket(&record).expect("maps");
        assert!(!ticket.waiting);
        let keys = ticket.refund_keys.expect("keys");
        assert_eq!(keys.sale_window, "09991");
        assert_eq!(keys.sale_sequence, "00123");
        assert_eq!(ticket.train_number.as_deref(), Some("0101"));
    }

    #[test]
    fn reservation_list_flattens_journeys() {
        let root = json!({
            "strResult": "SUCC",
            "jrny_infos": { "jrny_info": [
                { "train_infos": { "train_info": [
                    { "h_pnr_no": "000011111", "h_tot_seat_cnt": "2",
                      "h_ntisu_lmt_dt": "20260810", "h_ntisu_lmt_tm": "220000",
                      "h_rsv_amt": "99600", "h_run_dt": "20260815" }
                ]}}
            ]}
        });
        let reservations = reservations_from(&root).expect("maps");
        assert_eq!(reservations.len(), 1);
        assert!(!reservations[0].waiting);
    }
}
