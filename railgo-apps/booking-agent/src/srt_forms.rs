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

//! # SRT Form Builders
//!
//! Side-effect free request-body encoding for the SRT mobile endpoints.
//! Field names and constant values are dictated by the backend; this module
//! only assembles them.

use crate::backend::{CardDetails, Reservation};
use crate::errors::RailError;
use crate::identity::LoginMethod;
use crate::passenger::Passenger;
use crate::schedule::{window_seat_code, Schedule, WindowSeat};

pub const SRT_MOBILE: &str = "https://app.srail.or.kr:443";

pub mod endpoints {
    use super::SRT_MOBILE;

    pub fn main() -> String {
        format!("{SRT_MOBILE}/main/main.do")
    }
    pub fn login() -> String {
        format!("{SRT_MOBILE}/apb/selectListApb01080_n.do")
    }
    pub fn logout() -> String {
        format!("{SRT_MOBILE}/login/loginOut.do")
    }
    pub fn search_schedule() -> String {
        format!("{SRT_MOBILE}/ara/selectListAra10007_n.do")
    }
    pub fn reserve() -> String {
        format!("{SRT_MOBILE}/arc/selectListArc05013_n.do")
    }
    pub fn reservations() -> String {
        format!("{SRT_MOBILE}/atc/selectListAtc14016_n.do")
    }
    pub fn ticket_info() -> String {
        format!("{SRT_MOBILE}/ard/selectListArd02019_n.do")
    }
    pub fn cancel() -> String {
        format!("{SRT_MOBILE}/ard/selectListArd02045_n.do")
    }
    pub fn standby_option() -> String {
        format!("{SRT_MOBILE}/ata/selectListAta01135_n.do")
    }
    pub fn payment() -> String {
        format!("{SRT_MOBILE}/ata/selectListAta09036_n.do")
    }
    pub fn reserve_info() -> String {
        format!("{SRT_MOBILE}/atc/getListAtc14087.do")
    }
    pub fn reserve_info_referer(reservation_number: &str) -> String {
        format!(
            "{SRT_MOBILE}/common/ATC/ATC0201L/view.do?pnrNo={}",
            urlencoding::encode(reservation_number)
        )
    }
    pub fn refund() -> String {
        format!("{SRT_MOBILE}/atc/selectListAtc02063_n.do")
    }
}

/// Job id of the write: personal reservation vs standby queue entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReserveJob {
    Personal,
    Standby,
}

impl ReserveJob {
    pub fn wire_code(self) -> &'static str {
        match self {
            ReserveJob::Personal => "1101",
            ReserveJob::Standby => "1102",
        }
    }
}

pub type Form = Vec<(String, String)>;

fn push(form: &mut Form, key: &str, value: impl Into<String>) {
    form.push((key.to_string(), value.into()));
}

pub fn login_mode_code(method: LoginMethod) -> &'static str {
    match method {
        LoginMethod::MembershipNumber => "1",
        LoginMethod::Email => "2",
        LoginMethod::PhoneNumber => "3",
    }
}

pub fn login_form(method: LoginMethod, identifier: &str, credential: &str) -> Form {
    let mut form = Form::new();
    push(&mut form, "auto", "Y");
    push(&mut form, "check", "Y");
    push(&mut form, "page", "menu");
    push(&mut form, "deviceKey", "-");
    push(&mut form, "customerYn", "");
    push(&mut form, "login_referer", endpoints::main());
    push(&mut form, "srchDvCd", login_mode_code(method));
    push(&mut form, "srchDvNm", identifier);
    push(&mut form, "hmpgPwdCphd", credential);
    form
}

pub fn search_form(
    date: &str,
    time: &str,
    dep_code: &str,
    arr_code: &str,
    passenger_total: u32,
    admission_token: &str,
) -> Form {
    let hour_block = format!("{}0000", &time[..2.min(time.len())]);
    let mut form = Form::new();
    push(&mut form, "chtnDvCd", "1");
    push(&mut form, "dptDt", date);
    push(&mut form, "dptTm", time);
    push(&mut form, "dptDt1", date);
    push(&mut form, "dptTm1", hour_block);
    push(&mut form, "dptRsStnCd", dep_code);
    push(&mut form, "arvRsStnCd", arr_code);
    push(&mut form, "stlbTrnClsfCd", "05");
    push(&mut form, "trnGpCd", "109");
    push(&mut form, "trnNo", "");
    push(&mut form, "psgNum", passenger_total.to_string());
    push(&mut form, "seatAttCd", "015");
    push(&mut form, "arriveTime", "N");
    push(&mut form, "tkDptDt", "");
    push(&mut form, "tkDptTm", "");
    push(&mut form, "tkTrnNo", "");
    push(&mut form, "tkTripChgFlg", "");
    push(&mut form, "dlayTnumAplFlg", "Y");
    push(&mut form, "netfunnelKey", admission_token);
    form
}

/// Indexed passenger grid shared by the reserve and standby forms. Fails on
/// categories this backend has no type code for.
pub fn passenger_grid(
    passengers: &[Passenger],
    special_seat: bool,
    window: Option<WindowSeat>,
) -> Result<Form, RailError> {
    let mut form = Form::new();
    push(
        &mut form,
        "totPrnb",
        crate::passenger::total(passengers).to_string(),
    );
    push(&mut form, "psgGridcnt", passengers.len().to_string());
    push(&mut form, "locSeatAttCd1", window_seat_code(window));
    push(&mut form, "rqSeatAttCd1", "015");
    push(&mut form, "dirSeatAttCd1", "009");
    push(&mut form, "smkSeatAttCd1", "000");
    push(&mut form, "etcSeatAttCd1", "000");
    push(&mut form, "psrmClCd1", if special_seat { "2" } else { "1" });

    for (i, passenger) in passengers.iter().enumerate() {
        let index = i + 1;
        let type_code = passenger.category.srt_type_code().ok_or_else(|| {
            RailError::InvalidPassenger(format!(
                "{} line items are not accepted by this backend",
                passenger.category.label()
            ))
        })?;
        form.push((format!("psgTpCd{index}"), type_code.to_string()));
        form.push((format!("psgInfoPerPrnb{index}"), passenger.count.to_string()));
    }
    Ok(form)
}

#[allow(clippy::too_many_arguments)]
pub fn reserve_form(
    job: ReserveJob,
    schedule: &Schedule,
    passengers: &[Passenger],
    special_seat: bool,
    window: Option<WindowSeat>,
    phone_number: Option<&str>,
    admission_token: &str,
) -> Result<Form, RailError> {
    let train_number = schedule
        .train_number
        .parse::<u32>()
        .map(|n| format!("{n:05}"))
        .unwrap_or_else(|_| schedule.train_number.clone());

    let mut form = Form::new();
    push(&mut form, "jobId", job.wire_code());
    push(&mut form, "jrnyCnt", "1");
    push(&mut form, "jrnyTpCd", "11");
    push(&mut form, "jrnySqno1", "001");
    push(&mut form, "stndFlg", "N");
    push(&mut form, "trnGpCd1", "300");
    push(&mut form, "trnGpCd", "109");
    push(&mut form, "grpDv", "0");
    push(&mut form, "rtnDv", "0");
    push(&mut form, "stlbTrnClsfCd1", schedule.train_class_code.clone());
    push(&mut form, "dptRsStnCd1", schedule.dep_station_code.clone());
    push(&mut form, "dptRsStnCdNm1", schedule.dep_station_name.clone());
    push(&mut form, "arvRsStnCd1", schedule.arr_station_code.clone());
    push(&mut form, "arvRsStnCdNm1", schedule.arr_station_name.clone());
    push(&mut form, "dptDt1", schedule.dep_date.clone());
    push(&mut form, "dptTm1", schedule.dep_time.clone());
    push(&mut form, "arvTm1", schedule.arr_time.clone());
    push(&mut form, "trnNo1", train_number);
    push(&mut form, "runDt1", schedule.run_date.clone());
    push(&mut form, "dptStnConsOrdr1", schedule.dep_cons_order.clone());
    push(&mut form, "arvStnConsOrdr1", schedule.arr_cons_order.clone());
    push(&mut form, "dptStnRunOrdr1", schedule.dep_run_order.clone());
    push(&mut form, "arvStnRunOrdr1", schedule.arr_run_order.clone());
    push(&mut form, "mblPhone", phone_number.unwrap_or_default());
    push(&mut form, "netfunnelKey", admission_token);
    if job == ReserveJob::Personal {
        push(&mut form, "reserveType", "11");
    }
    form.extend(passenger_grid(passengers, special_seat, window)?);
    Ok(form)
}

pub fn standby_option_form(
    reservation_number: &str,
    agree_sms: bool,
    agree_class_change: bool,
    phone_number: Option<&str>,
) -> Form {
    let mut form = Form::new();
    push(&mut form, "pnrNo", reservation_number);
    push(
        &mut form,
        "psrmClChgFlg",
        if agree_class_change { "Y" } else { "N" },
    );
    push(&mut form, "smsSndFlg", if agree_sms { "Y" } else { "N" });
    push(
        &mut form,
        "telNo",
        if agree_sms {
            phone_number.unwrap_or_default()
        } else {
            ""
        },
    );
    form
}

pub fn reservations_form() -> Form {
    vec![("pageNo".to_string(), "0".to_string())]
}

pub fn ticket_info_form(reservation_number: &str) -> Form {
    let mut form = Form::new();
    push(&mut form, "pnrNo", reservation_number);
    push(&mut form, "jrnySqno", "1");
    form
}

pub fn cancel_form(reservation_number: &str) -> Form {
    let mut form = Form::new();
    push(&mut form, "pnrNo", reservation_number);
    push(&mut form, "jrnyCnt", "1");
    push(&mut form, "rsvChgTno", "0");
    form
}

pub fn pay_form(
    reservation: &Reservation,
    card: &CardDetails,
    membership_number: &str,
    settlement_date: &str,
) -> Form {
    let mut form = Form::new();
    push(&mut form, "stlDmnDt", settlement_date);
    push(&mut form, "mbCrdNo", membership_number);
    push(&mut form, "stlMnsSqno1", "1");
    push(&mut form, "ststlGridcnt", "1");
    push(&mut form, "totNewStlAmt", reservation.total_price.to_string());
    push(&mut form, "athnDvCd1", card.effective_type().wire_code());
    push(&mut form, "vanPwd1", card.password_prefix.clone());
    push(&mut form, "crdVlidTrm1", card.expiry.clone());
    push(&mut form, "stlMnsCd1", "02");
    push(&mut form, "rsvChgTno", "0");
    push(&mut form, "chgMcs", "0");
    push(&mut form, "ismtMnthNum1", card.installments.to_string());
    push(&mut form, "ctlDvCd", "3102");
    push(&mut form, "cgPsId", "korail");
    push(&mut form, "pnrNo", reservation.reservation_number.clone());
    push(&mut form, "totPrnb", reservation.seat_count.to_string());
    push(&mut form, "mnsStlAmt1", reservation.total_price.to_string());
    push(&mut form, "crdInpWayCd1", "@");
    push(&mut form, "athnVal1", card.validation_value.clone());
    push(&mut form, "stlCrCrdNo1", card.number.clone());
    push(&mut form, "jrnyCnt", "1");
    push(&mut form, "strJobId", "3102");
    push(&mut form, "inrecmnsGridcnt", "1");
    push(&mut form, "dptTm", reservation.dep_time.clone());
    push(&mut form, "arvTm", reservation.arr_time.clone());
    push(&mut form, "dptStnConsOrdr2", "000000");
    push(&mut form, "arvStnConsOrdr2", "000000");
    push(&mut form, "trnGpCd", "300");
    push(&mut form, "pageNo", "-");
    push(&mut form, "rowCnt", "-");
    push(&mut form, "pageUrl", "");
    form
}

// Stored by the backend as the cancellation reason on a refund.
pub const REFUND_REASON: &str = "승차권 환불로 취소";

/// Refund form, built from the sale identifiers the reservation-info lookup
/// returned.
pub fn refund_form(
    reservation_number: &str,
    sale_date: &str,
    sale_window: &str,
    sale_sequence: &str,
    return_password: &str,
    buyer_name: &str,
) -> Form {
    let mut form = Form::new();
    push(&mut form, "pnr_no", reservation_number);
    push(&mut form, "cnc_dmn_cont", REFUND_REASON);
    push(&mut form, "saleDt", sale_date);
    push(&mut form, "saleWctNo", sale_window);
    push(&mut form, "saleSqno", sale_sequence);
    push(&mut form, "tkRetPwd", return_password);
    push(&mut form, "psgNm", buyer_name);
    form
}
