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

//! # Korail Form Builders
//!
//! Side-effect free request encoding for the Korail mobile endpoints. Every
//! call carries the app's Device/Version/Key triple; the rest of the fields
//! are per-operation.

use crate::backend::{CardDetails, RefundKeys, Reservation, Ticket};
use crate::errors::RailError;
use crate::identity::LoginMethod;
use crate::passenger::{Passenger, PassengerCategory};
use crate::schedule::Schedule;

pub const KORAIL_MOBILE: &str = "https://smart.letskorail.com:443/classes/com.korail.mobile";

pub const DEVICE: &str = "AD";
pub const VERSION: &str = "240531001";
pub const APP_KEY: &str = "korail1234567890";

/// All trains; narrower class codes exist but the engine searches wide and
/// filters on seat state instead.
pub const TRAIN_TYPE_ALL: &str = "109";

pub mod endpoints {
    use super::KORAIL_MOBILE;

    pub fn login() -> String {
        format!("{KORAIL_MOBILE}.login.Login")
    }
    pub fn logout() -> String {
        format!("{KORAIL_MOBILE}.common.logout")
    }
    pub fn search_schedule() -> String {
        format!("{KORAIL_MOBILE}.seatMovie.ScheduleView")
    }
    pub fn reserve() -> String {
        format!("{KORAIL_MOBILE}.certification.TicketReservation")
    }
    pub fn cancel() -> String {
        format!("{KORAIL_MOBILE}.reservationCancel.ReservationCancelChk")
    }
    pub fn ticket_seat() -> String {
        format!("{KORAIL_MOBILE}.refunds.SelTicketInfo")
    }
    pub fn ticket_list() -> String {
        format!("{KORAIL_MOBILE}.myTicket.MyTicketList")
    }
    pub fn reservation_list() -> String {
        format!("{KORAIL_MOBILE}.reservation.ReservationView")
    }
    pub fn pay() -> String {
        format!("{KORAIL_MOBILE}.payment.ReservationPayment")
    }
    pub fn refund() -> String {
        format!("{KORAIL_MOBILE}.refunds.RefundsRequest")
    }
    pub fn cipher_key() -> String {
        format!("{KORAIL_MOBILE}.common.code.do")
    }
}

pub type Form = Vec<(String, String)>;

fn push(form: &mut Form, key: &str, value: impl Into<String>) {
    form.push((key.to_string(), value.into()));
}

fn base_form() -> Form {
    let mut form = Form::new();
    push(&mut form, "Device", DEVICE);
    push(&mut form, "Version", VERSION);
    push(&mut form, "Key", APP_KEY);
    form
}

pub fn login_mode_code(method: LoginMethod) -> &'static str {
    match method {
        LoginMethod::MembershipNumber => "2",
        LoginMethod::PhoneNumber => "4",
        LoginMethod::Email => "5",
    }
}

/// Fetches the AES key the credential codec needs.
pub fn cipher_key_form() -> Form {
    vec![("code".to_string(), "app.login.cphd".to_string())]
}

pub fn login_form(
    method: LoginMethod,
    identifier: &str,
    encrypted_credential: &str,
    key_index: &str,
) -> Form {
    let mut form = base_form();
    push(&mut form, "txtMemberNo", identifier);
    push(&mut form, "txtPwd", encrypted_credential);
    push(&mut form, "txtInputFlg", login_mode_code(method));
    push(&mut form, "idx", key_index);
    form
}

/// Per-category head counts the search endpoint takes; toddlers ride the
/// child counter.
pub fn category_counts(passengers: &[Passenger]) -> [u32; 5] {
    let mut counts = [0u32; 5];
    for p in passengers {
        let slot = match p.category {
            PassengerCategory::Adult => 0,
            PassengerCategory::Child | PassengerCategory::Toddler => 1,
            PassengerCategory::Senior => 2,
            PassengerCategory::Disability1To3 => 3,
            PassengerCategory::Disability4To6 => 4,
        };
        counts[slot] += p.count;
    }
    counts
}

pub fn search_form(
    dep_name: &str,
    arr_name: &str,
    date: &str,
    time: &str,
    passengers: &[Passenger],
    membership_number: &str,
) -> Form {
    let counts = category_counts(passengers);
    let mut form = base_form();
    push(&mut form, "Sid", "");
    push(&mut form, "txtMenuId", "11");
    push(&mut form, "radJobId", "1");
    push(&mut form, "selGoTrain", TRAIN_TYPE_ALL);
    push(&mut form, "txtTrnGpCd", TRAIN_TYPE_ALL);
    push(&mut form, "txtGoStart", dep_name);
    push(&mut form, "txtGoEnd", arr_name);
    push(&mut form, "txtGoAbrdDt", date);
    push(&mut form, "txtGoHour", time);
    for (i, count) in counts.iter().enumerate() {
        form.push((format!("txtPsgFlg_{}", i + 1), count.to_string()));
    }
    push(&mut form, "txtSeatAttCd_2", "000");
    push(&mut form, "txtSeatAttCd_3", "000");
    push(&mut form, "txtSeatAttCd_4", "015");
    push(&mut form, "ebizCrossCheck", "N");
    push(&mut form, "srtCheckYn", "N");
    push(&mut form, "rtYn", "N");
    push(&mut form, "adjStnScdlOfrFlg", "N");
    push(&mut form, "mbCrdNo", membership_number);
    form
}

/// Indexed per-line-item fragment of the reserve form.
pub fn passenger_fields(passenger: &Passenger, index: usize) -> Form {
    let card = passenger.card.clone().unwrap_or_default();
    vec![
        (
            format!("txtPsgTpCd{index}"),
            passenger.category.korail_type_code().to_string(),
        ),
        (
            format!("txtDiscKndCd{index}"),
            passenger.discount_code.clone(),
        ),
        (format!("txtCompaCnt{index}"), passenger.count.to_string()),
        (format!("txtCardCode_{index}"), card.code),
        (format!("txtCardNo_{index}"), card.number),
        (format!("txtCardPw_{index}"), card.password),
    ]
}

pub fn reserve_form(
    schedule: &Schedule,
    passengers: &[Passenger],
    special_seat: bool,
    standby: bool,
    admission_token: &str,
) -> Form {
    let total: u32 = passengers.iter().map(|p| p.count).sum();
    let mut form = base_form();
    push(&mut form, "txtMenuId", "11");
    push(&mut form, "txtJobId", if standby { "1102" } else { "1101" });
    push(&mut form, "txtGdNo", "");
    push(&mut form, "hidFreeFlg", "N");
    push(&mut form, "txtTotPsgCnt", total.to_string());
    push(&mut form, "txtSeatAttCd1", "000");
    push(&mut form, "txtSeatAttCd2", "000");
    push(&mut form, "txtSeatAttCd3", "000");
    push(&mut form, "txtSeatAttCd4", "015");
    push(&mut form, "txtSeatAttCd5", "000");
    push(&mut form, "txtStndFlg", "N");
    push(&mut form, "txtSrcarCnt", "0");
    push(&mut form, "txtJrnyCnt", "1");
    push(&mut form, "txtJrnySqno1", "001");
    push(&mut form, "txtJrnyTpCd1", "11");
    push(&mut form, "txtDptDt1", schedule.dep_date.clone());
    push(&mut form, "txtDptRsStnCd1", schedule.dep_station_code.clone());
    push(&mut form, "txtDptTm1", schedule.dep_time.clone());
    push(&mut form, "txtArvRsStnCd1", schedule.arr_station_code.clone());
    push(&mut form, "txtTrnNo1", schedule.train_number.clone());
    push(&mut form, "txtRunDt1", schedule.run_date.clone());
    push(&mut form, "txtTrnClsfCd1", schedule.train_class_code.clone());
    push(&mut form, "txtTrnGpCd1", TRAIN_TYPE_ALL);
    push(&mut form, "txtPsrmClCd1", if special_seat { "2" } else { "1" });
    push(&mut form, "txtChgFlg1", "");
    push(&mut form, "txtJrnySqno2", "");
    push(&mut form, "txtJrnyTpCd2", "");
    push(&mut form, "txtDptDt2", "");
    push(&mut form, "txtDptRsStnCd2", "");
    push(&mut form, "txtDptTm2", "");
    push(&mut form, "txtArvRsStnCd2", "");
    push(&mut form, "txtTrnNo2", "");
    push(&mut form, "txtRunDt2", "");
    push(&mut form, "txtTrnClsfCd2", "");
    push(&mut form, "txtPsrmClCd2", "");
    push(&mut form, "txtChgFlg2", "");
    push(&mut form, "netfunnelKey", admission_token);
    for (i, passenger) in passengers.iter().enumerate() {
        form.extend(passenger_fields(passenger, i + 1));
    }
    form
}

pub fn reservation_list_form() -> Form {
    base_form()
}

pub fn ticket_list_form() -> Form {
    let mut form = base_form();
    push(&mut form, "txtDeviceId", "");
    push(&mut form, "txtIndex", "1");
    push(&mut form, "h_page_no", "1");
    push(&mut form, "h_abrd_dt_from", "");
    push(&mut form, "h_abrd_dt_to", "");
    push(&mut form, "hiduserYn", "Y");
    form
}

pub fn ticket_seat_form(keys: &RefundKeys) -> Form {
    let mut form = base_form();
    push(&mut form, "h_orgtk_wct_no", keys.sale_window.clone());
    push(&mut form, "h_orgtk_ret_sale_dt", keys.sale_date.clone());
    push(&mut form, "h_orgtk_sale_sqno", keys.sale_sequence.clone());
    push(&mut form, "h_orgtk_ret_pwd", keys.return_password.clone());
    form
}

pub fn cancel_form(reservation: &Reservation) -> Form {
    let mut form = base_form();
    push(&mut form, "txtPnrNo", reservation.reservation_number.clone());
    push(&mut form, "txtJrnySqno", reservation.journey_number.clone());
    push(&mut form, "txtJrnyCnt", reservation.journey_count.clone());
    push(&mut form, "hidRsvChgNo", reservation.change_number.clone());
    form
}

pub fn pay_form(reservation: &Reservation, card: &CardDetails) -> Result<Form, RailError> {
    let sales_window = reservation.sales_window.clone().ok_or_else(|| {
        RailError::InvalidRequest(
            "reservation carries no sales-window id; re-fetch it before paying".into(),
        )
    })?;
    let mut form = base_form();
    push(&mut form, "hidPnrNo", reservation.reservation_number.clone());
    push(&mut form, "hidWctNo", sales_window);
    push(&mut form, "hidTmpJobSqno1", "000000");
    push(&mut form, "hidTmpJobSqno2", "000000");
    push(&mut form, "hidRsvChgNo", "000");
    push(&mut form, "hidInrecmnsGridcnt", "1");
    push(&mut form, "hidStlMnsSqno1", "1");
    push(&mut form, "hidStlMnsCd1", "02");
    push(&mut form, "hidMnsStlAmt1", reservation.total_price.to_string());
    push(&mut form, "hidCrdInpWayCd1", "@");
    push(&mut form, "hidStlCrCrdNo1", card.number.clone());
    push(&mut form, "hidVanPwd1", card.password_prefix.clone());
    push(&mut form, "hidCrdVlidTrm1", card.expiry.clone());
    push(&mut form, "hidIsmtMnthNum1", card.installments.to_string());
    push(&mut form, "hidAthnDvCd1", card.effective_type().wire_code());
    push(&mut form, "hidAthnVal1", card.validation_value.clone());
    push(&mut form, "hiduserYn", "Y");
    Ok(form)
}

pub fn refund_form(ticket: &Ticket) -> Result<Form, RailError> {
    let keys = ticket.refund_keys.clone().ok_or_else(|| {
        RailError::InvalidRequest("ticket carries no sale identifiers; refresh the ticket list".into())
    })?;
    let train_number = ticket.train_number.clone().ok_or_else(|| {
        RailError::InvalidRequest("ticket carries no train number; refresh the ticket list".into())
    })?;
    let mut form = base_form();
    push(&mut form, "txtPrnNo", ticket.reservation_number.clone());
    push(&mut form, "h_orgtk_sale_dt", keys.sale_date);
    push(&mut form, "h_orgtk_sale_wct_no", keys.sale_window);
    push(&mut form, "h_orgtk_sale_sqno", keys.sale_sequence);
    push(&mut form, "h_orgtk_ret_pwd", keys.return_password);
    push(&mut form, "h_mlg_stl", "N");
    push(&mut form, "tk_ret_tms_dv_cd", "21");
    push(&mut form, "trnNo", train_number);
    push(&mut form, "pbpAcepTgtFlg", "N");
    push(&mut form, "latitude", "");
    push(&mut form, "longitude", "");
    Ok(form)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::passenger::CardReference;

    fn lookup<'a>(form: &'a Form, key: &str) -> Option<&'a str> {
        form.iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    #[test]
    fn every_form_carries_the_app_triple() {
        let form = reservation_list_form();
        assert_eq!(lookup(&form, "Device"), Some("AD"));
        assert_eq!(lookup(&form, "Version"), Some(VERSION));
        assert_eq!(lookup(&form, "Key"), Some(APP_KEY));
    }

    #[test]
    fn login_form_carries_mode_and_key_index() {
        let form = login_form(LoginMethod::PhoneNumber, "01012345678", "CIPHERTEXT", "3");
        assert_eq!(lookup(&form, "txtInputFlg"), Some("4"));
        assert_eq!(lookup(&form, "txtPwd"), Some("CIPHERTEXT"));
        assert_eq!(lookup(&form, "idx"), Some("3"));
    }

    #[test]
    fn category_counts_fold_toddlers_into_children() {
        let passengers = vec![
            Passenger::adult(2),
            Passenger::new(PassengerCategory::Child, 1),
            Passenger::new(PassengerCategory::Toddler, 1),
            Passenger::new(PassengerCategory::Disability4To6, 1),
        ];
        assert_eq!(category_counts(&passengers), [2, 2, 0, 0, 1]);
    }

    #[test]
    fn search_form_spreads_category_counters() {
        let passengers = vec![
            Passenger::adult(1),
            Passenger::new(PassengerCategory::Senior, 2),
        ];
        let form = search_form("서울", "부산", "20260815", "080000", &passengers, "12345");
        assert_eq!(lookup(&form, "txtPsgFlg_1"), Some("1"));
        assert_eq!(lookup(&form, "txtPsgFlg_2"), Some("0"));
        assert_eq!(lookup(&form, "txtPsgFlg_3"), Some("2"));
        assert_eq!(lookup(&form, "txtGoStart"), Some("서울"));
        assert_eq!(lookup(&form, "mbCrdNo"), Some("12345"));
    }

    #[test]
    fn passenger_fields_thread_discount_and_card() {
        let passenger = Passenger::new(PassengerCategory::Senior, 1)
            .with_card(CardReference {
                code: "C1".into(),
                number: "9999".into(),
                password: "00".into(),
            });
        let fields = passenger_fields(&passenger, 2);
        assert_eq!(lookup(&fields, "txtPsgTpCd2"), Some("1"));
        assert_eq!(lookup(&fields, "txtDiscKndCd2"), Some("131"));
        assert_eq!(lookup(&fields, "txtCompaCnt2"), Some("1"));
        assert_eq!(lookup(&fields, "txtCardCode_2"), Some("C1"));
    }

    #[test]
    fn standby_flag_flips_job_id() {
        let schedule = sample_schedule();
        let seat = reserve_form(&schedule, &[Passenger::adult(1)], false, false, "T");
        assert_eq!(lookup(&seat, "txtJobId"), Some("1101"));
        let standby = reserve_form(&schedule, &[Passenger::adult(1)], false, true, "T");
        assert_eq!(lookup(&standby, "txtJobId"), Some("1102"));
        assert_eq!(lookup(&standby, "netfunnelKey"), Some("T"));
    }

    #[test]
    fn pay_form_requires_sales_window() {
        let mut reservation = sample_reservation();
        reservation.sales_window = None;
        let card = CardDetails {
            number: "1111222233334444".into(),
            password_prefix: "12".into(),
            validation_value: "981204".into(),
            expiry: "2909".into(),
            installments: 0,
            card_type: None,
        };
        assert!(matches!(
            pay_form(&reservation, &card),
            Err(RailError::InvalidRequest(_))
        ));
        reservation.sales_window = Some("09991".into());
        let form = pay_form(&reservation, &card).expect("builds");
        assert_eq!(lookup(&form, "hidWctNo"), Some("09991"));
        assert_eq!(lookup(&form, "hidAthnDvCd1"), Some("J"));
    }

    fn sample_schedule() -> Schedule {
        Schedule {
            train_class_code: "100".into(),
            train_class_name: "KTX".into(),
            train_number: "0101".into(),
            dep_station_code: "0001".into(),
            dep_station_name: "서울".into(),
            dep_date: "20260815".into(),
            dep_time: "080000".into(),
            arr_station_code: "0020".into(),
            arr_station_name: "부산".into(),
            arr_time: "104500".into(),
            run_date: "20260815".into(),
            dep_run_order: String::new(),
            dep_cons_order: String::new(),
            arr_run_order: String::new(),
            arr_cons_order: String::new(),
            general_seat: crate::schedule::SeatState::Available,
            special_seat: crate::schedule::SeatState::Unavailable,
            standby: crate::schedule::StandbyState(-1),
        }
    }

    fn sample_reservation() -> Reservation {
        Reservation {
            reservation_number: "000012345".into(),
            total_price: 59_800,
            seat_count: 1,
            train_class_code: "100".into(),
            train_class_name: "KTX".into(),
            train_number: "0101".into(),
            dep_date: "20260815".into(),
            dep_time: "080000".into(),
            dep_station_code: "0001".into(),
            dep_station_name: "서울".into(),
            arr_time: "104500".into(),
            arr_station_code: "0020".into(),
            arr_station_name: "부산".into(),
            payment_due_date: "20260810".into(),
            payment_due_time: "235900".into(),
            paid: false,
            waiting: false,
            journey_number: "001".into(),
            journey_count: "01".into(),
            change_number: "00000".into(),
            sales_window: Some("09991".into()),
            tickets: Vec::new(),
        }
    }
}
